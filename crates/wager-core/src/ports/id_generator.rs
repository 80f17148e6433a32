//! IdGenerator port - ID 生成の抽象化
//!
//! envelope と checkpoint snapshot の ID を発行します。
//! Clock を差し替えれば時刻部分を固定できます。

use ulid::Ulid;

use crate::domain::ids::{EnvelopeId, SnapshotId};
use crate::ports::Clock;

/// IdGenerator は ULID 互換の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（stage context から `&dyn` で参照される）
pub trait IdGenerator: Send + Sync {
    fn generate_envelope_id(&self) -> EnvelopeId;

    fn generate_snapshot_id(&self) -> SnapshotId;
}

/// Clock の時刻 + 80bit の乱数で ULID を組み立てる
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_envelope_id(&self) -> EnvelopeId {
        EnvelopeId::from(self.next())
    }

    fn generate_snapshot_id(&self) -> SnapshotId {
        SnapshotId::from(self.next())
    }
}
