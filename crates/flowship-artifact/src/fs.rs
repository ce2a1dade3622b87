use std::path::Path;

use tokio::fs;

/// Recursively copy a directory, returning the number of files copied.
pub async fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<usize, std::io::Error> {
  fs::create_dir_all(dest).await?;

  let mut copied = 0;
  let mut entries = fs::read_dir(src).await?;
  while let Some(entry) = entries.next_entry().await? {
    let src_path = entry.path();
    let dest_path = dest.join(entry.file_name());

    if entry.file_type().await?.is_dir() {
      copied += Box::pin(copy_dir_recursive(&src_path, &dest_path)).await?;
    } else {
      fs::copy(&src_path, &dest_path).await?;
      copied += 1;
    }
  }

  Ok(copied)
}
