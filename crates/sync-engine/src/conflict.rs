// crates/sync-engine/src/conflict.rs
//! Conflict resolution strategies
//!
//! Each strategy has one handler, chosen in `decide`. Handlers are pure:
//! they take the server copy read under the record lock and return what to
//! keep, leaving the write to the caller.

use crate::error::{SyncError, SyncResult};
use ledgerline_core::{ConflictStrategy, Record};

/// What resolving a conflict produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The server copy stands; nothing to write
    Keep(Record),
    /// This record replaces the server copy
    Write(Record),
}

impl Decision {
    pub fn record(&self) -> &Record {
        match self {
            Decision::Keep(record) | Decision::Write(record) => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Decision::Keep(record) | Decision::Write(record) => record,
        }
    }
}

/// Applies `strategy` to the server copy and the client's version
///
/// `client-wins` and `merge` need the client version; a missing one is
/// invalid data.
pub fn decide(
    strategy: ConflictStrategy,
    server: &Record,
    client: Option<&Record>,
) -> SyncResult<Decision> {
    let decision = match strategy {
        ConflictStrategy::ServerWins => server_wins(server),
        ConflictStrategy::ClientWins => client_wins(server, require_client(strategy, client)?),
        ConflictStrategy::Merge => merge(server, require_client(strategy, client)?),
    };

    // A write that changes nothing is a keep
    Ok(match decision {
        Decision::Write(record) if record.same_content(server) => Decision::Keep(server.clone()),
        other => other,
    })
}

fn require_client(strategy: ConflictStrategy, client: Option<&Record>) -> SyncResult<&Record> {
    client.ok_or_else(|| {
        SyncError::InvalidData(format!("{} requires a client version", strategy))
    })
}

fn server_wins(server: &Record) -> Decision {
    Decision::Keep(server.clone())
}

fn client_wins(server: &Record, client: &Record) -> Decision {
    Decision::Write(Record {
        id: server.id.clone(),
        user_id: server.user_id.clone(),
        ..client.clone()
    })
}

/// Field-wise merge that never drops information either side can keep
///
/// The amount with the larger magnitude wins (the server's on a tie); text
/// fields take the client's value unless it is blank; the date and the
/// recency stamp take the later of the two.
fn merge(server: &Record, client: &Record) -> Decision {
    let amount = if client.amount.abs() > server.amount.abs() {
        client.amount
    } else {
        server.amount
    };

    Decision::Write(Record {
        id: server.id.clone(),
        user_id: server.user_id.clone(),
        amount,
        description: prefer_non_blank(&client.description, &server.description),
        category: prefer_non_blank(&client.category, &server.category),
        occurred_on: server.occurred_on.max(client.occurred_on),
        updated_at: server.updated_at.max(client.updated_at),
    })
}

fn prefer_non_blank(preferred: &str, fallback: &str) -> String {
    if preferred.trim().is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}
