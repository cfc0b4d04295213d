//! `AuctionSessionManager`: the periodic driver described in spec §4.9.
//!
//! Grounded in `original_source/auctions-service/main/auctionSessionManager.go`'s
//! three `intermittently*` goroutines, each polling its own "time since last
//! run" against a cadence and then calling back into the service. That
//! source drives shutdown with a single shared `bool` the workers poll —
//! spec §9 Design Notes flags this as racy on a `TurnOff` immediately
//! followed by `TurnOn` (workers from the old generation can outlive their
//! intended lifetime and race the new generation's workers). This
//! implementation gives each worker generation its own
//! `crossbeam_channel::Receiver<()>`; `turn_off` drops the paired sender,
//! which unblocks every worker's next `recv_timeout` (or immediately, since
//! a disconnected channel wakes a blocking receiver) without requiring the
//! worker to poll a shared flag at all.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::info;

use crate::clock::Clock;
use crate::config::Config;
use crate::service::AuctionService;

/// How far back `turn_on` loads auctions on cold start — unbounded-past, so
/// a restart after long downtime still picks up un-finalized auctions (spec
/// §4.9: "on cold start after long downtime, this must be unbounded-past").
fn earliest_epoch() -> DateTime<Utc> {
    "1950-01-01T00:00:00Z".parse().expect("valid constant timestamp")
}

pub struct SessionManagerConfig {
    pub alert_cycle: Duration,
    pub finalize_cycle: Duration,
    pub load_cycle: Duration,
    pub load_ahead_duration: Duration,
    pub load_behind_duration: Duration,
    pub finalize_delay: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            alert_cycle: Duration::minutes(5),
            finalize_cycle: Duration::minutes(5),
            load_cycle: Duration::minutes(5),
            load_ahead_duration: Duration::hours(2),
            load_behind_duration: Duration::hours(2),
            finalize_delay: Duration::minutes(30),
        }
    }
}

impl From<&Config> for SessionManagerConfig {
    fn from(config: &Config) -> Self {
        Self {
            alert_cycle: Duration::seconds(config.alert_cycle_secs as i64),
            finalize_cycle: Duration::seconds(config.finalize_cycle_secs as i64),
            load_cycle: Duration::seconds(config.load_cycle_secs as i64),
            load_ahead_duration: Duration::seconds(config.load_ahead_secs),
            load_behind_duration: Duration::seconds(config.load_behind_secs),
            finalize_delay: Duration::seconds(config.finalize_delay_secs),
        }
    }
}

struct Generation {
    _stop_senders: Vec<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

pub struct AuctionSessionManager {
    service: Arc<AuctionService>,
    clock: Arc<dyn Clock>,
    config: SessionManagerConfig,
    generation: Mutex<Option<Generation>>,
}

impl AuctionSessionManager {
    pub fn new(service: Arc<AuctionService>, clock: Arc<dyn Clock>, config: SessionManagerConfig) -> Self {
        Self {
            service,
            clock,
            config,
            generation: Mutex::new(None),
        }
    }

    pub fn is_on(&self) -> bool {
        self.generation.lock().unwrap().is_some()
    }

    /// Loads `[earliest, now + load_ahead_duration]`, runs one alert pass and
    /// one finalize pass immediately, then spawns three workers. A no-op if
    /// already on.
    pub fn turn_on(&self) {
        let mut generation = self.generation.lock().unwrap();
        if generation.is_some() {
            return;
        }

        let now = self.clock.now();
        if let Err(e) = self
            .service
            .load_auctions_into_memory(earliest_epoch(), now + self.config.load_ahead_duration)
        {
            log::error!("[AuctionSessionManager] cold-start load failed: {}", e);
        }
        if let Err(e) = self.service.send_out_lifecycle_alerts() {
            log::error!("[AuctionSessionManager] cold-start alert pass failed: {}", e);
        }
        if let Err(e) = self.service.finalize_any_past_auctions(self.config.finalize_delay) {
            log::error!("[AuctionSessionManager] cold-start finalize pass failed: {}", e);
        }

        let mut stop_senders = Vec::with_capacity(3);
        let mut handles = Vec::with_capacity(3);

        let (load_tx, load_rx) = bounded::<()>(0);
        stop_senders.push(load_tx);
        handles.push(self.spawn_load_worker(load_rx, now));

        let (alert_tx, alert_rx) = bounded::<()>(0);
        stop_senders.push(alert_tx);
        handles.push(self.spawn_alert_worker(alert_rx));

        let (finalize_tx, finalize_rx) = bounded::<()>(0);
        stop_senders.push(finalize_tx);
        handles.push(self.spawn_finalize_worker(finalize_rx));

        info!("[AuctionSessionManager] turned on");
        *generation = Some(Generation {
            _stop_senders: stop_senders,
            handles,
        });
    }

    /// Drops this generation's stop senders, which unblocks every worker's
    /// `recv_timeout` and lets it exit, then joins the threads. A no-op if
    /// already off.
    pub fn turn_off(&self) {
        let generation = self.generation.lock().unwrap().take();
        if let Some(generation) = generation {
            drop(generation._stop_senders);
            for handle in generation.handles {
                let _ = handle.join();
            }
            info!("[AuctionSessionManager] turned off");
        }
    }

    fn spawn_load_worker(&self, stop: Receiver<()>, start_now: DateTime<Utc>) -> JoinHandle<()> {
        let service = self.service.clone();
        let clock = self.clock.clone();
        let cadence = std_duration(self.config.load_cycle);
        let load_ahead = self.config.load_ahead_duration;
        thread::spawn(move || {
            let mut last_load_time = start_now;
            loop {
                match stop.recv_timeout(cadence) {
                    Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                }
                let now = clock.now();
                if let Err(e) = service.load_auctions_into_memory(last_load_time + load_ahead, now + load_ahead) {
                    log::error!("[AuctionSessionManager] periodic load failed: {}", e);
                }
                last_load_time = now;
            }
        })
    }

    fn spawn_alert_worker(&self, stop: Receiver<()>) -> JoinHandle<()> {
        let service = self.service.clone();
        let cadence = std_duration(self.config.alert_cycle);
        thread::spawn(move || loop {
            match stop.recv_timeout(cadence) {
                Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            }
            if let Err(e) = service.send_out_lifecycle_alerts() {
                log::error!("[AuctionSessionManager] periodic alert pass failed: {}", e);
            }
        })
    }

    fn spawn_finalize_worker(&self, stop: Receiver<()>) -> JoinHandle<()> {
        let service = self.service.clone();
        let cadence = std_duration(self.config.finalize_cycle);
        let finalize_delay = self.config.finalize_delay;
        thread::spawn(move || loop {
            match stop.recv_timeout(cadence) {
                Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            }
            if let Err(e) = service.finalize_any_past_auctions(finalize_delay) {
                log::error!("[AuctionSessionManager] periodic finalize pass failed: {}", e);
            }
        })
    }
}

impl Drop for AuctionSessionManager {
    fn drop(&mut self) {
        self.turn_off();
    }
}

fn std_duration(d: Duration) -> StdDuration {
    d.to_std().unwrap_or(StdDuration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_util::FixedClock;
    use crate::notifications::test_util::RecordingNotificationSink;
    use crate::repository::{InMemoryAuctionRepository, InMemoryBidRepository};

    fn manager() -> AuctionSessionManager {
        let bid_repo = Arc::new(InMemoryBidRepository::new("test"));
        let service = Arc::new(AuctionService::new(
            bid_repo.clone(),
            Arc::new(InMemoryAuctionRepository::new(bid_repo)),
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(RecordingNotificationSink::default()),
        ));
        AuctionSessionManager::new(
            service,
            Arc::new(FixedClock::new(Utc::now())),
            SessionManagerConfig {
                alert_cycle: Duration::milliseconds(20),
                finalize_cycle: Duration::milliseconds(20),
                load_cycle: Duration::milliseconds(20),
                ..SessionManagerConfig::default()
            },
        )
    }

    #[test]
    fn turn_on_is_idempotent_and_turn_off_joins_workers() {
        let manager = manager();
        assert!(!manager.is_on());
        manager.turn_on();
        assert!(manager.is_on());
        manager.turn_on(); // no-op, does not double-spawn
        manager.turn_off();
        assert!(!manager.is_on());
        manager.turn_off(); // no-op
    }

    #[test]
    fn turn_off_then_turn_on_does_not_double_spawn() {
        let manager = manager();
        manager.turn_on();
        manager.turn_off();
        manager.turn_on();
        assert!(manager.is_on());
        manager.turn_off();
    }
}
