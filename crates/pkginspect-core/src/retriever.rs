//! 包获取：将包标识下载/解包到目标目录，返回解包后的目录列表
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::{InspectError, Result};

/// 默认的外部下载工具
pub const DEFAULT_DOWNLOAD_COMMAND: &str = "oss-download";

const ARCHIVE_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".crate"];

/// 获取器契约；返回空列表表示该标识下载失败
pub trait PackageRetriever: Send + Sync {
    fn download(&self, identifier: &str, destination: &Path) -> Result<Vec<PathBuf>>;
}

/// 本地 gzip tar 归档（`.tar.gz` / `.tgz` / `.crate`）
#[derive(Debug, Default, Clone)]
pub struct ArchiveRetriever;

impl ArchiveRetriever {
    pub fn accepts(&self, identifier: &str) -> bool {
        let lower = identifier.to_ascii_lowercase();
        ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s)) && Path::new(identifier).is_file()
    }
}

impl PackageRetriever for ArchiveRetriever {
    fn download(&self, identifier: &str, destination: &Path) -> Result<Vec<PathBuf>> {
        let lower = identifier.to_ascii_lowercase();
        if !ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return Err(InspectError::UnsupportedArchive(PathBuf::from(identifier)));
        }
        debug!(archive = identifier, dest = %destination.display(), "unpacking archive");
        let tar = GzDecoder::new(File::open(identifier)?);
        let mut archive = Archive::new(tar);
        archive.unpack(destination)?;
        extracted_directories(destination)
    }
}

/// 本地源码目录：复制进工作区，保证清理时不触碰原目录
#[derive(Debug, Default, Clone)]
pub struct DirectoryRetriever;

impl DirectoryRetriever {
    pub fn accepts(&self, identifier: &str) -> bool {
        Path::new(identifier).is_dir()
    }
}

impl PackageRetriever for DirectoryRetriever {
    fn download(&self, identifier: &str, destination: &Path) -> Result<Vec<PathBuf>> {
        let source = Path::new(identifier);
        let name = source.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "package".into());
        let target = destination.join(name);
        debug!(source = identifier, dest = %target.display(), "copying directory");

        for entry in WalkDir::new(source) {
            let entry = entry?;
            let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let out = target.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&out)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &out)?;
            }
            // 符号链接不复制
        }
        Ok(vec![target])
    }
}

/// 通过外部下载工具获取：
/// `<program> --download-directory <dest> --extract <identifier>`
#[derive(Debug, Clone)]
pub struct CommandRetriever {
    pub program: String,
}

impl CommandRetriever {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for CommandRetriever {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_COMMAND)
    }
}

impl PackageRetriever for CommandRetriever {
    fn download(&self, identifier: &str, destination: &Path) -> Result<Vec<PathBuf>> {
        let program = which::which(&self.program)
            .map_err(|_| InspectError::DownloaderMissing(self.program.clone()))?;
        debug!(program = %program.display(), identifier, "invoking download tool");

        let output = Command::new(&program)
            .arg("--download-directory")
            .arg(destination)
            .arg("--extract")
            .arg(identifier)
            .output()?;
        if !output.status.success() {
            return Err(InspectError::DownloaderFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        extracted_directories(destination)
    }
}

/// 按标识形态分派：本地归档 → 本地目录 → 外部下载工具
#[derive(Debug, Clone, Default)]
pub struct DefaultRetriever {
    pub archive: ArchiveRetriever,
    pub directory: DirectoryRetriever,
    pub command: CommandRetriever,
}

impl DefaultRetriever {
    pub fn with_download_command(program: impl Into<String>) -> Self {
        Self { command: CommandRetriever::new(program), ..Self::default() }
    }
}

impl PackageRetriever for DefaultRetriever {
    fn download(&self, identifier: &str, destination: &Path) -> Result<Vec<PathBuf>> {
        if self.archive.accepts(identifier) {
            self.archive.download(identifier, destination)
        } else if self.directory.accepts(identifier) {
            self.directory.download(identifier, destination)
        } else {
            self.command.download(identifier, destination)
        }
    }
}

/// 解包结果：顶层若有普通文件则整个目录即为源码根，否则为各个子目录（按名称排序）
fn extracted_directories(destination: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut has_files = false;
    for entry in fs::read_dir(destination)? {
        let entry = entry?;
        let ft = entry.file_type()?;
        if ft.is_dir() {
            dirs.push(entry.path());
        } else if ft.is_file() {
            has_files = true;
        }
    }
    if has_files {
        return Ok(vec![destination.to_path_buf()]);
    }
    dirs.sort();
    trace!(count = dirs.len(), "extracted directories");
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn build_archive(path: &Path, entries: &[(&str, &str)]) {
        let gz = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(gz);
        for (name, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn unpacks_crate_archive_into_package_directory() {
        let home = tempfile::tempdir().unwrap();
        let archive = home.path().join("left-pad-1.3.0.crate");
        build_archive(
            &archive,
            &[
                ("left-pad-1.3.0/src/lib.rs", "pub fn pad() {}\n"),
                ("left-pad-1.3.0/Cargo.toml", "[package]\n"),
            ],
        );
        let dest = tempfile::tempdir().unwrap();

        let r = ArchiveRetriever;
        let id = archive.to_str().unwrap();
        assert!(r.accepts(id));
        let dirs = r.download(id, dest.path()).unwrap();
        assert_eq!(dirs, vec![dest.path().join("left-pad-1.3.0")]);
        assert!(dirs[0].join("src/lib.rs").is_file());
    }

    #[test]
    fn flat_archive_yields_destination_itself() {
        let home = tempfile::tempdir().unwrap();
        let archive = home.path().join("flat.tgz");
        build_archive(&archive, &[("index.js", "module.exports = 1;\n")]);
        let dest = tempfile::tempdir().unwrap();
        let dirs = ArchiveRetriever.download(archive.to_str().unwrap(), dest.path()).unwrap();
        assert_eq!(dirs, vec![dest.path().to_path_buf()]);
    }

    #[test]
    fn unsupported_extension_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let err = ArchiveRetriever.download("pkg.zip", dest.path()).unwrap_err();
        assert!(matches!(err, InspectError::UnsupportedArchive(_)));
        assert!(!ArchiveRetriever.accepts("pkg:npm/left-pad@1.3.0"));
    }

    #[test]
    fn directory_copied_not_moved() {
        let src = tempfile::tempdir().unwrap();
        let pkg = src.path().join("mypkg");
        fs::create_dir_all(pkg.join("lib")).unwrap();
        fs::write(pkg.join("lib/a.py"), "import os\n").unwrap();
        let dest = tempfile::tempdir().unwrap();

        let r = DirectoryRetriever;
        let id = pkg.to_str().unwrap();
        assert!(r.accepts(id));
        let dirs = r.download(id, dest.path()).unwrap();
        assert_eq!(dirs, vec![dest.path().join("mypkg")]);
        assert!(dirs[0].join("lib/a.py").is_file());
        assert!(pkg.join("lib/a.py").is_file());
    }

    #[test]
    fn missing_download_tool_reported() {
        let dest = tempfile::tempdir().unwrap();
        let r = CommandRetriever::new("pkginspect-no-such-downloader-xyz");
        let err = r.download("pkg:npm/left-pad@1.3.0", dest.path()).unwrap_err();
        assert!(matches!(
            err,
            InspectError::DownloaderMissing(p) if p == "pkginspect-no-such-downloader-xyz"
        ));
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-download");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn download_tool_invoked_with_destination_and_identifier() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "mkdir -p \"$2/$4\" && echo hi > \"$2/$4/readme.txt\"");
        let dest = tempfile::tempdir().unwrap();
        let dirs = CommandRetriever::new(program).download("pkgdir", dest.path()).unwrap();
        assert_eq!(dirs, vec![dest.path().join("pkgdir")]);
        assert!(dirs[0].join("readme.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn download_tool_failure_carries_stderr() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "echo 'not found' >&2; exit 3");
        let dest = tempfile::tempdir().unwrap();
        match CommandRetriever::new(program).download("pkg:npm/x@1", dest.path()) {
            Err(InspectError::DownloaderFailed { stderr, .. }) => assert_eq!(stderr, "not found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn download_tool_producing_nothing_yields_no_directories() {
        let bin = tempfile::tempdir().unwrap();
        let program = script(bin.path(), "exit 0");
        let dest = tempfile::tempdir().unwrap();
        let dirs = CommandRetriever::new(program).download("pkg:npm/x@1", dest.path()).unwrap();
        assert!(dirs.is_empty());
    }

    #[test]
    fn default_dispatches_local_directory() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let r = DefaultRetriever::with_download_command("pkginspect-no-such-downloader-xyz");
        let dirs = r.download(src.path().to_str().unwrap(), dest.path()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert!(matches!(
            r.download("pkg:npm/left-pad@1.3.0", dest.path()),
            Err(InspectError::DownloaderMissing(_))
        ));
    }
}
