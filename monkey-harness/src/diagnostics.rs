//! Forensic dump of a replica's protocol state and peer addresses.

use monkey_core::{
    AddressResolver, GroupId, ProtocolState, ReplicaHandle, ReplicaId, ReplicaState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// What a replica looked like at the moment of the dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub group_id: GroupId,
    pub replica_id: ReplicaId,
    pub protocol: ProtocolState,
    /// Member to address. Members whose address could not be resolved are
    /// absent.
    pub addresses: BTreeMap<ReplicaId, String>,
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.protocol;
        write!(
            f,
            "group {} replica {}: role {}, term {}, ",
            self.group_id, self.replica_id, p.role, p.term
        )?;
        writeln!(
            f,
            "commit {}, applied {}, log [{}, {}], in-mem log {} bytes",
            p.commit_index, p.applied_index, p.first_index, p.last_index, p.in_mem_log_size
        )?;
        for (replica_id, address) in &self.addresses {
            writeln!(f, "  replica {} -> {}", replica_id, address)?;
        }
        Ok(())
    }
}

/// Receives rendered diagnostic reports.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, report: &DiagnosticReport);
}

/// Writes reports to the `tracing` subscriber at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, report: &DiagnosticReport) {
        info!(
            group_id = %report.group_id,
            replica_id = %report.replica_id,
            role = %report.protocol.role,
            term = report.protocol.term,
            commit_index = report.protocol.commit_index,
            applied_index = report.protocol.applied_index,
            peers = report.addresses.len(),
            "{}",
            report
        );
    }
}

/// Builds the report for `handle` and writes it to the tracing sink.
pub fn dump_info<H: ReplicaHandle>(
    handle: &H,
    resolver: &dyn AddressResolver,
) -> DiagnosticReport {
    let report = collect(handle, resolver);
    TracingSink.emit(&report);
    report
}

/// Like [`dump_info`] with a caller supplied sink.
pub fn dump_info_to<H: ReplicaHandle>(
    handle: &H,
    resolver: &dyn AddressResolver,
    sink: &dyn DiagnosticSink,
) -> DiagnosticReport {
    let report = collect(handle, resolver);
    sink.emit(&report);
    report
}

fn collect<H: ReplicaHandle>(handle: &H, resolver: &dyn AddressResolver) -> DiagnosticReport {
    let (members, protocol) = handle.with_state(|state| {
        let membership = state.membership();
        let mut members: Vec<ReplicaId> = membership
            .addresses
            .keys()
            .chain(membership.non_voting.keys())
            .copied()
            .collect();
        members.sort();
        members.dedup();
        (members, state.protocol_state())
    });

    let group_id = handle.group_id();
    let self_id = handle.replica_id();
    let mut addresses = BTreeMap::new();
    for replica_id in members {
        if replica_id == self_id {
            addresses.insert(replica_id, handle.address().to_string());
            continue;
        }
        match resolver.resolve(group_id, replica_id) {
            Ok(address) => {
                addresses.insert(replica_id, address);
            }
            Err(e) => debug!("omitting replica {} from dump: {}", replica_id, e),
        }
    }

    DiagnosticReport {
        group_id,
        replica_id: self_id,
        protocol,
        addresses,
    }
}
