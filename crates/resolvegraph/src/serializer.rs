// moon: The build system and package manager for MoonBit.
// Copyright (C) 2024 International Digital Economy Academy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// For inquiries, you can contact us via e-mail at jichuruanjian@idea.edu.cn.

//! Binary persistence of resolution results.
//!
//! Each serializer owns a variant dictionary and is not reentrant. Use one
//! instance per stream, or call `reset` between independent graphs.

mod component;
mod failure;
mod graph;
mod ids;
mod variant;

pub use component::{ComponentResultSerializer, writes_selection_flags};
pub use failure::{read_failure, write_failure};
pub use graph::ResolutionResultSerializer;
pub use ids::*;
pub use variant::{NO_VARIANT, ResolvedVariantSerializer};
