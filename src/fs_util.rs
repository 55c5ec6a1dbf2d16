//! ファイル書き込みユーティリティ
//!
//! 途中でプロセスが落ちても完成済みファイルを壊さないよう、
//! 上書きは同じディレクトリの一時ファイル経由のリネーム、ログは追記のみで行う。

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// 一時ファイルに書いてからリネームで置き換える
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// 1行を追記モードで書き込む
///
/// 行全体を1回の `write_all` で書くので、追記モードなら他の書き込みと行が混ざらない。
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
