//! Text presenter
//!
//! Compact per-tick rendering of the aggregated snapshot: one primary
//! panel, then each chain with its replicas in order. The monitor is
//! agnostic to this; any other Presenter can replace it.

use std::fmt::Write as _;

use crate::monitor::{ClusterSnapshot, LagClass, Presenter, ReplicaRecord};
use crate::node::Lsn;

/// Renders snapshots as plain text to stdout
pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn render(&self, snapshot: &ClusterSnapshot) {
        print!("{}", render_to_string(snapshot));
    }
}

fn fmt_lsn(lsn: Option<Lsn>) -> String {
    match lsn {
        Some(lsn) => lsn.to_string(),
        None => "-".into(),
    }
}

fn stale_marker(stale: bool) -> &'static str {
    if stale {
        "  [stale]"
    } else {
        ""
    }
}

fn tier(class: LagClass) -> &'static str {
    class.as_str()
}

/// Build the textual panel for one snapshot
pub fn render_to_string(snapshot: &ClusterSnapshot) -> String {
    let mut out = String::with_capacity(1024);
    let primary = &snapshot.primary;

    let _ = writeln!(
        out,
        "== {} ==",
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S%.3f")
    );
    let _ = writeln!(
        out,
        "{}  status: {}  durability({}): {}{}",
        primary.name,
        primary.state,
        primary.durability_mode,
        tier(primary.durability),
        stale_marker(primary.stale),
    );
    let _ = writeln!(
        out,
        "    sent: {}  wait_write: {}  wait_flush: {}  wait_apply: {}",
        fmt_lsn(primary.stats.sent_lsn),
        fmt_lsn(primary.stats.wait_write_lsn),
        fmt_lsn(primary.stats.wait_flush_lsn),
        fmt_lsn(primary.stats.wait_apply_lsn),
    );

    for (chain_no, chain) in snapshot.chains.iter().enumerate() {
        let _ = writeln!(out, "chain {}", chain_no);
        for record in chain {
            render_replica(&mut out, record);
        }
    }
    out
}

fn render_replica(out: &mut String, record: &ReplicaRecord) {
    let _ = writeln!(
        out,
        "  [{}] {} ({})  status: {}{}",
        record.index,
        record.name,
        record.role,
        record.state,
        stale_marker(record.stale),
    );
    let _ = writeln!(
        out,
        "      durability({}): {}  receive: {}  apply: {}",
        record.durability_mode,
        tier(record.lag.durability),
        tier(record.lag.receive),
        tier(record.lag.apply),
    );
    let _ = writeln!(
        out,
        "      downstream: {}  last_receive: {}  last_apply: {}  sent: {}",
        fmt_lsn(record.stats.downstream_lsn(record.durability_mode)),
        fmt_lsn(record.stats.last_receive_lsn),
        fmt_lsn(record.stats.last_apply_lsn),
        fmt_lsn(record.stats.sent_lsn),
    );
}
