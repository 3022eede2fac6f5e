//! Content coordination: placement, replica selection, host caches and the
//! host side of the CMP exchange.

use log::{debug, info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use rust_ccdn_common::{
    metrics::CcdnMetrics, CmpPacket, CmpType, ContentId, Error, HostId, Result, SimulationConfig,
    Version,
};
use rust_ccdn_tables::ContentCache;

use crate::audit::AuditLog;
use crate::directory::{ContentDirectory, DirectoryEntry};
use crate::tasks::{TaskState, TaskTracker};
use crate::topology::HostLocation;

/// Host asked for content the directory does not know.
pub const DEFAULT_HOLDER: HostId = HostId(0);

/// Distance above any real host distance; the starting point of the
/// nearest-replica search.
const UNREACHABLE_DISTANCE: u32 = 8;

/// What the coordinator needs from the network it runs on.
pub trait Transport {
    /// Current virtual time.
    fn now(&self) -> Duration;

    /// Send a CMP packet from one host to another.
    fn send_cmp(&mut self, from: HostId, to: HostId, packet: CmpPacket) -> Result<()>;

    /// Start a bulk transfer. The transport reports completion back through
    /// [`ContentCoordinator::on_transfer_complete`].
    fn start_transfer(
        &mut self,
        holder: HostId,
        requester: HostId,
        content: ContentId,
        version: Version,
    ) -> Result<()>;
}

pub struct ContentCoordinator {
    directory: ContentDirectory,
    caches: Vec<ContentCache>,
    tasks: TaskTracker,
    half: u32,
    enable_cache: bool,
    rng: StdRng,
    metrics: Arc<CcdnMetrics>,
}

impl ContentCoordinator {
    pub fn new(
        config: &SimulationConfig,
        host_count: usize,
        audit: AuditLog,
        metrics: Arc<CcdnMetrics>,
    ) -> Result<Self> {
        let cache_capacity = NonZeroUsize::new(config.cache_size)
            .ok_or_else(|| Error::Config("cache_size must be at least 1".into()))?;

        Ok(Self {
            directory: ContentDirectory::new(),
            caches: vec![ContentCache::new(cache_capacity); host_count],
            tasks: TaskTracker::new(config.timeout(), config.max_retries, audit, metrics.clone()),
            half: config.half_port(),
            enable_cache: config.enable_cache,
            rng: StdRng::seed_from_u64(config.seed),
            metrics,
        })
    }

    pub fn host_count(&self) -> usize {
        self.caches.len()
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    fn check_host(&self, host: HostId) -> Result<()> {
        if host.index() < self.caches.len() {
            Ok(())
        } else {
            Err(Error::Topology(format!(
                "host {} out of range (have {} hosts)",
                host,
                self.caches.len()
            )))
        }
    }

    /* ---------------------------------------------------------------- *
     * Directory
     * ---------------------------------------------------------------- */

    pub fn create_content(&mut self, content: ContentId, hosts: Vec<HostId>) -> Result<()> {
        for host in &hosts {
            self.check_host(*host)?;
        }
        self.directory.create(content, hosts);
        Ok(())
    }

    pub fn update_content(&mut self, content: ContentId) -> Option<Version> {
        let version = self.directory.update(content);
        if version.is_none() {
            debug!("update of unknown content {}", content);
        }
        version
    }

    pub fn remove_content(&mut self, content: ContentId) -> bool {
        self.directory.remove(content)
    }

    /// True if `host` holds an original copy of `content`.
    pub fn has_content(&self, host: HostId, content: ContentId) -> bool {
        self.directory.holds(host, content)
    }

    pub fn get_content(&self, content: ContentId) -> Option<&DirectoryEntry> {
        self.directory.get(content)
    }

    /// Switch-hop distance between two hosts: 0 for the same host, 2 under
    /// the same edge switch, 4 in the same subtree, 6 otherwise.
    pub fn host_distance(&self, a: HostId, b: HostId) -> u32 {
        HostLocation::of(a, self.half).distance(&HostLocation::of(b, self.half))
    }

    /// Closest original holder of `content` and its current version. Ties
    /// are broken uniformly at random.
    pub fn nearest_replica(&mut self, local: HostId, content: ContentId) -> Option<(HostId, Version)> {
        let entry = self.directory.get(content)?;

        let mut best = None;
        let mut best_distance = UNREACHABLE_DISTANCE;
        let mut ties = 1u32;
        for &host in &entry.hosts {
            let distance = self.host_distance(local, host);
            if distance < best_distance {
                best = Some(host);
                best_distance = distance;
                ties = 1;
            } else if distance == best_distance {
                ties += 1;
                if self.rng.gen_range(0..ties) == 0 {
                    best = Some(host);
                }
            }
        }

        best.map(|host| (host, entry.version))
    }

    /* ---------------------------------------------------------------- *
     * Host caches
     * ---------------------------------------------------------------- */

    pub fn cache(&self, host: HostId) -> Option<&ContentCache> {
        self.caches.get(host.index())
    }

    pub fn add_cache(&mut self, host: HostId, content: ContentId, version: Version) -> bool {
        let added = self
            .caches
            .get_mut(host.index())
            .map_or(false, |cache| cache.add_entry(content, version));
        if added {
            self.metrics.cache_insertions.increment();
        }
        added
    }

    pub fn remove_cache(&mut self, host: HostId, content: ContentId) -> bool {
        self.caches
            .get_mut(host.index())
            .map_or(false, |cache| cache.remove_entry(content))
    }

    pub fn has_cache(&mut self, host: HostId, content: ContentId, version: Version) -> bool {
        self.caches
            .get_mut(host.index())
            .map_or(false, |cache| cache.has_entry(content, version))
    }

    /* ---------------------------------------------------------------- *
     * Fetching
     * ---------------------------------------------------------------- */

    fn send<T: Transport>(&self, transport: &mut T, from: HostId, to: HostId, packet: CmpPacket) -> Result<()> {
        self.metrics.sent(packet.kind).increment();
        transport.send_cmp(from, to, packet)
    }

    /// Start fetching `content` for `host`.
    pub fn request_content<T: Transport>(&mut self, transport: &mut T, host: HostId, content: ContentId) -> Result<()> {
        self.check_host(host)?;
        if !self.tasks.register(host, content, transport.now()) {
            return Ok(());
        }
        info!("host {} requests {}", host, content);
        self.reload(transport, host, content)
    }

    /// Send a Request for `content` to its nearest holder.
    pub fn reload<T: Transport>(&mut self, transport: &mut T, host: HostId, content: ContentId) -> Result<()> {
        let (remote, version) = match self.nearest_replica(host, content) {
            Some(found) => found,
            None => {
                debug!("no holder known for {}, asking host {}", content, DEFAULT_HOLDER);
                (DEFAULT_HOLDER, 0)
            }
        };
        trace!("host {} asks host {} for {} v{}", host, remote, content, version);
        self.send(transport, host, remote, CmpPacket::new(content, version, CmpType::Request))
    }

    /// Retry every task that timed out. Returns the number of retries.
    pub fn review<T: Transport>(&mut self, transport: &mut T) -> Result<usize> {
        let due = self.tasks.review(transport.now());
        for &(host, content) in &due {
            debug!("host {} retries {}", host, content);
            self.metrics.retries.increment();
            self.reload(transport, host, content)?;
        }
        Ok(due.len())
    }

    /// Host-side handling of a CMP packet delivered to `local`.
    pub fn handle_cmp<T: Transport>(
        &mut self,
        transport: &mut T,
        local: HostId,
        from: HostId,
        packet: CmpPacket,
    ) -> Result<()> {
        self.metrics.received(packet.kind).increment();
        let CmpPacket {
            content, version, ..
        } = packet;
        trace!("host {} got {} from host {}", local, packet, from);

        match packet.kind {
            CmpType::Finish => {
                self.add_cache(local, content, version);
                self.send(transport, local, from, CmpPacket::new(content, version, CmpType::FinishAck))
            }
            CmpType::Request => {
                let original = self.has_content(local, content);
                let cached = !original && self.enable_cache && self.has_cache(local, content, version);

                if original || cached {
                    if cached {
                        self.metrics.cache_hits.increment();
                    }
                    debug!("host {} serves {} v{} to host {}", local, content, version, from);
                    self.send(transport, local, from, CmpPacket::new(content, version, CmpType::Reply))?;
                    self.metrics.transfers_started.increment();
                    transport.start_transfer(local, from, content, version)
                } else {
                    self.send(transport, local, from, CmpPacket::new(content, version, CmpType::Reject))
                }
            }
            CmpType::Reply => {
                self.tasks.accept(local, from, content);
                Ok(())
            }
            CmpType::FinishAck => {
                trace!("host {} saw host {} store {}", local, from, content);
                Ok(())
            }
            CmpType::Reject => {
                let pending = self
                    .tasks
                    .get(local, content)
                    .map_or(false, |t| t.state == TaskState::Pending);
                if pending && self.directory.get(content).is_some() {
                    debug!("host {} rejected by host {} for {}, re-resolving", local, from, content);
                    self.reload(transport, local, content)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// A bulk transfer from `holder` to `requester` finished.
    pub fn on_transfer_complete<T: Transport>(
        &mut self,
        transport: &mut T,
        holder: HostId,
        requester: HostId,
        content: ContentId,
        version: Version,
    ) -> Result<()> {
        self.tasks.finish(requester, content, holder, transport.now())?;
        self.send(transport, holder, requester, CmpPacket::new(content, version, CmpType::Finish))
    }
}
