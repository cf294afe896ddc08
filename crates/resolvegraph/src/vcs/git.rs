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

//! A [`VersionControlSystem`] backed by the `git` command line tool.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    process::Command,
};

use super::{VersionControlSpec, VersionControlSystem, VersionRef};

pub struct GitVersionControlSystem;

fn run(command: &mut Command) -> Result<(), std::io::Error> {
    run_stdout(command).map(|_| ())
}

fn run_stdout(command: &mut Command) -> Result<String, std::io::Error> {
    log::debug!("Running {:?}", command);
    let output = command.output()?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(std::io::Error::other(format!(
            "Command {:?} failed with status: {}\nstdout: {}\nstderr: {}",
            command, output.status, stdout, stderr
        )));
    }
    String::from_utf8(output.stdout).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse stdout of command {:?}: {}", command, e),
        )
    })
}

fn git() -> Command {
    let mut command = Command::new("git");
    command.env("GIT_TERMINAL_PROMPT", "0");
    command
}

/// One line of `git ls-remote` output.
#[derive(Debug, PartialEq, Eq)]
enum RemoteRef<'a> {
    /// `<oid>\t<ref>`
    Object { oid: &'a str, name: &'a str },
    /// `ref: <target>\t<ref>`, printed with `--symref`.
    Symbolic { target: &'a str, name: &'a str },
}

fn parse_ls_remote(output: &str) -> Vec<RemoteRef<'_>> {
    output
        .lines()
        .filter_map(|line| {
            let (left, name) = line.split_once('\t')?;
            Some(match left.strip_prefix("ref: ") {
                Some(target) => RemoteRef::Symbolic {
                    target: target.trim(),
                    name: name.trim(),
                },
                None => RemoteRef::Object {
                    oid: left.trim(),
                    name: name.trim(),
                },
            })
        })
        .collect()
}

/// Tags of an ls-remote listing. Annotated tags resolve to the commit they
/// point at.
fn tags_of(refs: &[RemoteRef]) -> BTreeSet<VersionRef> {
    let mut tags = BTreeMap::new();
    for r in refs {
        let RemoteRef::Object { oid, name } = r else {
            continue;
        };
        let Some(tag) = name.strip_prefix("refs/tags/") else {
            continue;
        };
        match tag.strip_suffix("^{}") {
            Some(peeled) => {
                tags.insert(peeled, *oid);
            }
            None => {
                tags.entry(tag).or_insert(*oid);
            }
        }
    }
    tags.into_iter()
        .map(|(version, oid)| VersionRef {
            version: version.to_owned(),
            canonical_id: oid.to_owned(),
        })
        .collect()
}

fn default_branch_of(refs: &[RemoteRef]) -> Option<VersionRef> {
    let target = refs.iter().find_map(|r| match r {
        RemoteRef::Symbolic { target, name } if *name == "HEAD" => Some(*target),
        _ => None,
    })?;
    let oid = refs.iter().find_map(|r| match r {
        RemoteRef::Object { oid, name } if *name == "HEAD" || *name == target => Some(*oid),
        _ => None,
    })?;
    Some(VersionRef {
        version: target.trim_start_matches("refs/heads/").to_owned(),
        canonical_id: oid.to_owned(),
    })
}

impl VersionControlSystem for GitVersionControlSystem {
    fn default_branch(&self, spec: &VersionControlSpec) -> std::io::Result<VersionRef> {
        let output = run_stdout(
            git()
                .arg("ls-remote")
                .arg("--symref")
                .arg(spec.url.as_str())
                .arg("HEAD"),
        )?;
        default_branch_of(&parse_ls_remote(&output)).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} does not advertise a default branch", spec),
            )
        })
    }

    fn branch(&self, spec: &VersionControlSpec, name: &str) -> std::io::Result<Option<VersionRef>> {
        let full = format!("refs/heads/{name}");
        let output = run_stdout(
            git()
                .arg("ls-remote")
                .arg("--heads")
                .arg(spec.url.as_str())
                .arg(&full),
        )?;
        Ok(parse_ls_remote(&output).into_iter().find_map(|r| match r {
            RemoteRef::Object { oid, name: n } if n == full => Some(VersionRef {
                version: name.to_owned(),
                canonical_id: oid.to_owned(),
            }),
            _ => None,
        }))
    }

    fn available_versions(&self, spec: &VersionControlSpec) -> std::io::Result<BTreeSet<VersionRef>> {
        let output = run_stdout(
            git()
                .arg("ls-remote")
                .arg("--tags")
                .arg(spec.url.as_str()),
        )?;
        Ok(tags_of(&parse_ls_remote(&output)))
    }

    fn populate(&self, dir: &Path, version: &VersionRef, spec: &VersionControlSpec) -> std::io::Result<()> {
        if !dir.join(".git").exists() {
            run(git().arg("init").arg("--quiet").arg(dir))?;
            run(git()
                .arg("-C")
                .arg(dir)
                .arg("remote")
                .arg("add")
                .arg("origin")
                .arg(spec.url.as_str()))?;
        }
        run(git()
            .arg("-C")
            .arg(dir)
            .arg("fetch")
            .arg("--quiet")
            .arg("--depth")
            .arg("1")
            .arg("origin")
            .arg(&version.canonical_id))?;
        run(git()
            .arg("-C")
            .arg(dir)
            .arg("checkout")
            .arg("--quiet")
            .arg("--force")
            .arg("--detach")
            .arg(&version.canonical_id))
    }
}
