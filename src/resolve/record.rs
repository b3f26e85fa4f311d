use url::Url;

use crate::resolve::handle::FileHandle;

/// What a raw value turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    /// A literal server path or `file://` URL
    ///
    /// `verified` is false when the path could not be resolved and the handle was built from the
    /// string alone; such a handle is only good for error messages and never passes a permission check.
    ServerPath { handle: FileHandle, verified: bool },
    /// A URL (or placeholder reference) pointing at a file on this server
    ServerUrl { handle: FileHandle },
    /// A URL on another server
    ExternalUrl {
        handle: FileHandle,
        url: Url,
        /// Downloaded to the shared cache rather than the user's upload directory
        cached: bool,
        /// Never downloaded, the job gets the URL
        pass_by_reference: bool,
    },
    /// A file in the external collaboration service (GenomeSpace)
    ExternalServiceUrl { handle: FileHandle, url: Url },
}

impl ResolvedReference {
    pub fn handle(&self) -> &FileHandle {
        match self {
            ResolvedReference::ServerPath { handle, .. }
            | ResolvedReference::ServerUrl { handle }
            | ResolvedReference::ExternalUrl { handle, .. }
            | ResolvedReference::ExternalServiceUrl { handle, .. } => handle,
        }
    }

    pub fn into_handle(self) -> FileHandle {
        match self {
            ResolvedReference::ServerPath { handle, .. }
            | ResolvedReference::ServerUrl { handle }
            | ResolvedReference::ExternalUrl { handle, .. }
            | ResolvedReference::ExternalServiceUrl { handle, .. } => handle,
        }
    }

    pub fn url(&self) -> Option<&Url> {
        match self {
            ResolvedReference::ExternalUrl { url, .. } | ResolvedReference::ExternalServiceUrl { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Files on this server, subject to a read permission check
    pub fn is_server_file(&self) -> bool {
        matches!(self, ResolvedReference::ServerPath { .. } | ResolvedReference::ServerUrl { .. })
    }

    pub fn is_external(&self) -> bool {
        !self.is_server_file()
    }

    /// Has to be copied to the server before the job can use it
    pub fn needs_download(&self) -> bool {
        match self {
            ResolvedReference::ExternalUrl { pass_by_reference, .. } => !pass_by_reference,
            ResolvedReference::ExternalServiceUrl { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_by_reference_is_never_downloaded() {
        let url = Url::parse("https://example.org/a.gct").unwrap();
        let by_ref = ResolvedReference::ExternalUrl {
            handle: FileHandle::external(url.clone()),
            url: url.clone(),
            cached: false,
            pass_by_reference: true,
        };
        assert!(!by_ref.needs_download());
        assert!(by_ref.is_external());
        assert_eq!(by_ref.url(), Some(&url));

        let service = ResolvedReference::ExternalServiceUrl { handle: FileHandle::external(url.clone()), url };
        assert!(service.needs_download());
    }
}
