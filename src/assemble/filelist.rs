use std::path::Path;

use log::info;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::resolve::handle::FileHandle;
use crate::resolve::href::SERVER_URL_TOKEN;

/// One line of a file list
///
/// Files on the server are written as a placeholder-prefixed relative URI; files which were not
/// copied to the server (pass-by-reference) as their literal URL.
pub fn filelist_line(handle: &FileHandle, materialized: bool) -> Option<String> {
    match (&handle.relative_uri, &handle.url) {
        (Some(relative), _) if materialized || handle.url.is_none() => Some(format!("{SERVER_URL_TOKEN}{relative}")),
        (_, Some(url)) => Some(url.to_string()),
        (Some(relative), None) => Some(format!("{SERVER_URL_TOKEN}{relative}")),
        (None, None) => None,
    }
}

/// Write the file list, one line per value in submission order
pub async fn write_filelist(path: &Path, lines: &[String]) -> std::io::Result<()> {
    write_lines(path, lines.iter().map(|l| l.to_string())).await?;
    info!("Wrote file list with {} entries to {}", lines.len(), path.display());
    Ok(())
}

/// Write the group sidecar of a file list: `<line index>\t<group id>` per line
pub async fn write_group_file(path: &Path, groups: &[&str]) -> std::io::Result<()> {
    let lines = groups.iter().enumerate().map(|(idx, group)| format!("{idx}\t{group}"));
    write_lines(path, lines).await
}

async fn write_lines(path: &Path, lines: impl Iterator<Item = String>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;
    for line in lines {
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
    }
    file.flush().await
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use url::Url;

    use super::*;

    #[test]
    fn lines_depend_on_materialization() {
        let url = Url::parse("https://example.org/a.gct").unwrap();
        let downloaded = FileHandle {
            server_path: Some(PathBuf::from("/gp/users/alice/uploads/tmp/external/example.org/a.gct")),
            relative_uri: Some("/users/alice/tmp/external/example.org/a.gct".to_string()),
            url: Some(url.clone()),
            owner: Some("alice".to_string()),
        };
        assert_eq!(
            filelist_line(&downloaded, true).as_deref(),
            Some("<GenePatternURL>/users/alice/tmp/external/example.org/a.gct")
        );
        assert_eq!(filelist_line(&downloaded, false).as_deref(), Some("https://example.org/a.gct"));
        assert_eq!(filelist_line(&FileHandle::external(url), false).as_deref(), Some("https://example.org/a.gct"));
    }

    #[tokio::test]
    async fn writes_lines_and_groups_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("run1/input/input.list.txt");
        write_filelist(&list, &["<GenePatternURL>/users/a/b.gct".to_string(), "https://x/y.gct".to_string()])
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&list).unwrap(),
            "<GenePatternURL>/users/a/b.gct\nhttps://x/y.gct\n"
        );
        let groups = dir.path().join("run1/input/input.group.txt");
        write_group_file(&groups, &["tumor", ""]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&groups).unwrap(), "0\ttumor\n1\t\n");
    }
}
