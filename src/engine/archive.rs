//! Build context packaging for the Docker Engine API
//!
//! The API expects the whole build context as a tar stream, with the build
//! file addressed by its path inside that archive. Entries matched by the
//! `.dockerignore` at the context root are left out; ones in subdirectories
//! are ordinary files. Every pattern is anchored at the context root, so
//! `*.log` excludes `build.log` but not `sub/app.log`. The build file itself
//! is always included, and one living outside the context is added under
//! [`EXTERNAL_DOCKERFILE_NAME`].

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, trace};

pub const DOCKERIGNORE: &str = ".dockerignore";
pub const EXTERNAL_DOCKERFILE_NAME: &str = ".build-retry.Dockerfile";

/// Tarred build context plus the in-archive name of the build file
#[derive(Debug)]
pub struct ContextArchive {
    pub bytes: Vec<u8>,
    pub dockerfile: String,
    pub entries: usize,
}

pub fn build_context_archive(context: &Path, dockerfile: &Path) -> io::Result<ContextArchive> {
    let dockerfile_name = archive_name(context, dockerfile);
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    let excludes = load_dockerignore(context)?;
    let mut entries = 0;
    let mut dockerfile_included = false;

    let walker = WalkBuilder::new(context)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let path = entry.path();
        let rel = match path.strip_prefix(context) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if excludes.matched_path_or_any_parents(rel, false).is_ignore() {
            trace!(entry = %rel.display(), "Excluded by .dockerignore");
            continue;
        }

        let name = to_archive_path(rel);
        trace!(entry = %name, "Adding to build context");
        builder.append_path_with_name(path, &name)?;
        entries += 1;

        if name == dockerfile_name {
            dockerfile_included = true;
        }
    }

    if !dockerfile_included {
        debug!(dockerfile = %dockerfile_name, "Adding build file outside the walked context");
        builder.append_path_with_name(dockerfile, &dockerfile_name)?;
        entries += 1;
    }

    let bytes = builder.into_inner()?;
    Ok(ContextArchive {
        bytes,
        dockerfile: dockerfile_name,
        entries,
    })
}

/// Reads `<context>/.dockerignore` with every pattern anchored at the root.
fn load_dockerignore(context: &Path) -> io::Result<Gitignore> {
    let path = context.join(DOCKERIGNORE);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Gitignore::empty()),
        Err(e) => return Err(e),
    };

    let mut builder = GitignoreBuilder::new(context);
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (negation, pattern) = match line.strip_prefix('!') {
            Some(rest) => ("!", rest.trim()),
            None => ("", line),
        };
        let pattern = pattern.trim_start_matches("./").trim_start_matches('/');
        if pattern.is_empty() {
            continue;
        }
        builder
            .add_line(Some(path.clone()), &format!("{}/{}", negation, pattern))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    }

    builder
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn archive_name(context: &Path, dockerfile: &Path) -> String {
    match dockerfile.strip_prefix(context) {
        Ok(rel) if !rel.as_os_str().is_empty() => to_archive_path(rel),
        _ => EXTERNAL_DOCKERFILE_NAME.to_string(),
    }
}

// Archive paths always use forward slashes
fn to_archive_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
