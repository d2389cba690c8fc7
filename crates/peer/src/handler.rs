// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Requests answered with a single response and no data frames.

use tracing::debug;

use cs_core::{scan_root, FilterSet, RootKind, ScanOptions, Snapshot};
use cs_proto::{RemoteError, RemoteErrorKind, RequestOp, ResponseBody};

use crate::config::PeerConfig;
use crate::transfer::SnapshotRequest;

/// Answers `op`; failures become a `Failed` response.
pub(crate) fn handle(config: &PeerConfig, op: RequestOp) -> ResponseBody {
    match try_handle(config, op) {
        Ok(body) => body,
        Err(error) => ResponseBody::Failed { error },
    }
}

fn remote(err: cs_core::Error) -> RemoteError {
    RemoteError::from(&err)
}

/// Scans a root for a `Snapshot` request.
pub(crate) fn scan_request(
    config: &PeerConfig,
    request: &SnapshotRequest,
) -> Result<(RootKind, Snapshot), RemoteError> {
    let native = config.resolve_root(&request.root)?;
    let mut options = ScanOptions::new(config.capabilities().permissions);
    options.filters = FilterSet::parse(&request.filters).map_err(remote)?;
    options.symlinks = request.symlinks;
    let (kind, snapshot) =
        scan_root(&native, request.entry.as_ref(), request.missing_ok, &options).map_err(remote)?;
    debug!(
        "snapshot of {} ({}): {} entries",
        native.display(),
        kind,
        snapshot.len()
    );
    Ok((kind, snapshot))
}

fn try_handle(config: &PeerConfig, op: RequestOp) -> Result<ResponseBody, RemoteError> {
    match op {
        RequestOp::Ping => Ok(ResponseBody::Pong),
        RequestOp::PrepareRoot { root, replace } => {
            let tree = config.tree(&root)?;
            if replace {
                tree.replace_root().map_err(remote)?;
            } else {
                tree.ensure_root().map_err(remote)?;
            }
            Ok(ResponseBody::Done)
        }
        RequestOp::CreateDir {
            root,
            path,
            permissions,
            expected,
        } => {
            let record = config
                .tree(&root)?
                .create_dir(&path, permissions, &expected)
                .map_err(remote)?;
            Ok(ResponseBody::Record {
                record: Some(record),
            })
        }
        RequestOp::CreateSymlink {
            root,
            path,
            target,
            expected,
        } => {
            let record = config
                .tree(&root)?
                .create_symlink(&path, &target, &expected)
                .map_err(remote)?;
            Ok(ResponseBody::Record {
                record: Some(record),
            })
        }
        RequestOp::Remove {
            root,
            path,
            expected,
        } => {
            config
                .tree(&root)?
                .remove(&path, &expected)
                .map_err(remote)?;
            Ok(ResponseBody::Done)
        }
        RequestOp::SetPermissions {
            root,
            path,
            permissions,
            expected,
        } => {
            let record = config
                .tree(&root)?
                .set_permissions(&path, permissions, &expected)
                .map_err(remote)?;
            Ok(ResponseBody::Record {
                record: Some(record),
            })
        }
        RequestOp::Stat { root, path } => {
            let record = config.tree(&root)?.stat(&path).map_err(remote)?;
            Ok(ResponseBody::Record { record })
        }
        op @ (RequestOp::Snapshot { .. }
        | RequestOp::ReadFile { .. }
        | RequestOp::WriteFile { .. }
        | RequestOp::Exec { .. }) => Err(RemoteError::new(
            RemoteErrorKind::InvalidRequest,
            format!("{} streams data and is not handled here", op.name()),
        )),
    }
}
