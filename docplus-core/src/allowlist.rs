//! Command allowlist gate.
//!
//! Extensions reach privileged commands only through [`CommandGate::invoke`].
//! A name outside the allowlist is rejected with
//! [`Error::PermissionDenied`] before the transport is contacted. Allowed
//! calls are forwarded unchanged; there are no retries here.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::CommandTransport;

/// Commands extensions may invoke when configuration does not say otherwise.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "read_file",
    "read_file_base64",
    "write_binary_file",
    "get_temp_dir",
    "open_file_with_app",
    "export_document_native",
    "export_and_open",
    "pandoc_export",
    "check_pandoc",
    "import_file",
    "list_documents",
    "get_document",
    "search_documents",
    "list_templates",
    "get_template_content",
    "resource_list",
    "resource_search",
    "resource_get",
    "test_smtp_connection",
    "send_email",
];

/// Immutable set of command names extensions may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAllowlist {
    names: BTreeSet<String>,
}

impl CommandAllowlist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(|name| {
                    let name: String = name.into();
                    name.trim().to_string()
                })
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Allowed names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Authorize `name` on behalf of `extension_id`.
    pub fn check(&self, extension_id: &str, name: &str) -> Result<()> {
        if self.is_allowed(name) {
            return Ok(());
        }
        warn!(
            extension_id,
            command = name,
            "Rejected command outside the allowlist"
        );
        Err(Error::permission_denied(extension_id, name, self.names()))
    }
}

impl Default for CommandAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_COMMANDS.iter().copied())
    }
}

/// Authorization boundary in front of a [`CommandTransport`].
#[derive(Clone)]
pub struct CommandGate {
    allowlist: Arc<CommandAllowlist>,
    transport: Arc<dyn CommandTransport>,
}

impl CommandGate {
    pub fn new(allowlist: Arc<CommandAllowlist>, transport: Arc<dyn CommandTransport>) -> Self {
        Self {
            allowlist,
            transport,
        }
    }

    pub fn allowlist(&self) -> &CommandAllowlist {
        &self.allowlist
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowlist.is_allowed(name)
    }

    /// Invoke `name` for `extension_id` if the allowlist permits it.
    pub async fn invoke(&self, extension_id: &str, name: &str, args: Value) -> Result<Value> {
        self.allowlist.check(extension_id, name)?;
        debug!(extension_id, command = name, "Forwarding allowed command");
        self.transport.invoke(name, args).await
    }
}

impl std::fmt::Debug for CommandGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGate")
            .field("allowlist", &self.allowlist)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// Transport that counts calls and echoes its arguments.
    #[derive(Default)]
    struct SpyTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CommandTransport for SpyTransport {
        async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::transport(format!("{name} exploded")));
            }
            Ok(json!({ "command": name, "args": args }))
        }
    }

    #[test]
    fn test_default_allowlist() {
        let allowlist = CommandAllowlist::default();
        assert!(allowlist.is_allowed("read_file"));
        assert!(allowlist.is_allowed("send_email"));
        assert!(!allowlist.is_allowed("delete_project"));
        assert!(!allowlist.is_allowed(""));
        assert_eq!(allowlist.len(), DEFAULT_ALLOWED_COMMANDS.len());
    }

    #[test]
    fn test_names_are_sorted_and_trimmed() {
        let allowlist = CommandAllowlist::new(["zeta", " alpha ", "", "mid"]);
        assert_eq!(allowlist.names(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_disallowed_command_never_reaches_transport() {
        let spy = Arc::new(SpyTransport::default());
        let gate = CommandGate::new(Arc::new(CommandAllowlist::default()), spy.clone());

        let err = gate
            .invoke("summarizer", "rm_rf_everything", json!({}))
            .await
            .unwrap_err();

        match err {
            Error::PermissionDenied {
                extension_id,
                command,
                allowed,
            } => {
                assert_eq!(extension_id, "summarizer");
                assert_eq!(command, "rm_rf_everything");
                assert_eq!(allowed.len(), DEFAULT_ALLOWED_COMMANDS.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_command_is_forwarded_unchanged() {
        let spy = Arc::new(SpyTransport::default());
        let gate = CommandGate::new(Arc::new(CommandAllowlist::default()), spy.clone());

        let result = assert_ok!(
            gate.invoke("summarizer", "read_file", json!({ "path": "/tmp/a.md" }))
                .await
        );

        assert_eq!(result["command"], "read_file");
        assert_eq!(result["args"]["path"], "/tmp/a.md");
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_without_retry() {
        let spy = Arc::new(SpyTransport {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let gate = CommandGate::new(Arc::new(CommandAllowlist::default()), spy.clone());

        let err = assert_err!(gate.invoke("summarizer", "get_temp_dir", Value::Null).await);
        assert!(err.is_transport());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }
}
