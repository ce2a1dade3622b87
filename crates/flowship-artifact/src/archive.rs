//! Tar packing and unpacking of directory trees.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::task::spawn_blocking;
use tracing::debug;

/// Pack the contents of `src` into an uncompressed tar archive.
///
/// Entry names are relative to `src` and emitted in sorted order so the same
/// tree always produces the same archive layout.
pub async fn archive_directory(src: &Path) -> std::io::Result<Bytes> {
  let src = src.to_owned();
  spawn_blocking(move || archive_directory_sync(&src)).await?
}

/// Unpack a tar archive into `dest`, creating it if needed.
pub async fn unpack_archive(data: Bytes, dest: &Path) -> std::io::Result<()> {
  let dest = dest.to_owned();
  spawn_blocking(move || unpack_archive_sync(&data, &dest)).await?
}

fn archive_directory_sync(src: &Path) -> std::io::Result<Bytes> {
  let mut tar_data = Vec::new();

  {
    let mut tar_builder = tar::Builder::new(&mut tar_data);
    tar_builder.follow_symlinks(false);

    for path in walk(src)? {
      let relative_path = path
        .strip_prefix(src)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

      if path.is_dir() {
        tar_builder.append_dir(relative_path, &path)?;
      } else {
        tar_builder.append_path_with_name(&path, relative_path)?;
      }
    }

    tar_builder.finish()?;
  }

  debug!(src = %src.display(), size = tar_data.len(), "created tar archive");
  Ok(Bytes::from(tar_data))
}

fn unpack_archive_sync(data: &[u8], dest: &Path) -> std::io::Result<()> {
  std::fs::create_dir_all(dest)?;

  let mut archive = tar::Archive::new(Cursor::new(data));
  archive.set_preserve_permissions(true);
  archive.unpack(dest)?;

  debug!(dest = %dest.display(), size = data.len(), "unpacked tar archive");
  Ok(())
}

fn walk(path: &Path) -> std::io::Result<Vec<PathBuf>> {
  let mut children: Vec<PathBuf> = std::fs::read_dir(path)?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<Result<_, _>>()?;
  children.sort();

  let mut paths = Vec::new();
  for child in children {
    let is_dir = std::fs::symlink_metadata(&child)?.is_dir();
    paths.push(child.clone());
    if is_dir {
      paths.extend(walk(&child)?);
    }
  }

  Ok(paths)
}
