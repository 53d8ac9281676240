//! Free TCP port allocation shared by every scenario in the process.
//!
//! The kernel picks a free port; the process-global lease set then makes
//! sure two concurrent scenarios are never handed the same one, even though
//! the probe socket is closed before the registry binds it.

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Mutex, MutexGuard};

use authgate_common::error::{HarnessError, Result};

/// Maximum number of probe sockets opened before giving up.
pub const MAX_PORT_ATTEMPTS: usize = 64;

static LEASED: Mutex<BTreeSet<u16>> = Mutex::new(BTreeSet::new());

/// A port reserved for one scenario; released when dropped.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
}

impl PortLease {
    /// The leased port number.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        if let Ok(mut leased) = LEASED.lock() {
            let _ = leased.remove(&self.port);
            tracing::trace!(port = self.port, "released port lease");
        }
    }
}

/// Allocates a port that is free on the loopback interface and not leased
/// to any other scenario in this process.
///
/// # Errors
///
/// Returns an error if no probe socket can be bound or every candidate is
/// already leased.
pub fn allocate() -> Result<PortLease> {
    for _ in 0..MAX_PORT_ATTEMPTS {
        let port = probe_free_port()?;
        if lock_leased()?.insert(port) {
            tracing::debug!(port, "leased free port");
            return Ok(PortLease { port });
        }
        tracing::trace!(port, "port already leased, probing again");
    }
    Err(HarnessError::Launch {
        message: format!("no unleased port found after {MAX_PORT_ATTEMPTS} attempts"),
    })
}

/// Returns whether `port` is currently leased by this process.
///
/// # Errors
///
/// Returns an error if the lease set lock is poisoned.
pub fn is_leased(port: u16) -> Result<bool> {
    Ok(lock_leased()?.contains(&port))
}

fn probe_free_port() -> Result<u16> {
    let listener =
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(|e| HarnessError::Launch {
            message: format!("cannot bind a probe socket: {e}"),
        })?;
    let addr = listener.local_addr().map_err(|e| HarnessError::Launch {
        message: format!("cannot read probe socket address: {e}"),
    })?;
    Ok(addr.port())
}

fn lock_leased() -> Result<MutexGuard<'static, BTreeSet<u16>>> {
    LEASED.lock().map_err(|_| HarnessError::Launch {
        message: "port lease lock poisoned".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leases_are_distinct_and_released() {
        let a = allocate().unwrap();
        let b = allocate().unwrap();
        assert_ne!(a.port(), b.port());
        assert!(is_leased(a.port()).unwrap());

        let port = a.port();
        drop(a);
        assert!(!is_leased(port).unwrap());
    }

    #[test]
    fn concurrent_allocations_never_collide() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| allocate().unwrap()))
            .collect();
        let leases: Vec<PortLease> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let ports: BTreeSet<u16> = leases.iter().map(PortLease::port).collect();
        assert_eq!(ports.len(), leases.len());
    }

    #[test]
    fn leased_port_is_bindable() {
        let lease = allocate().unwrap();
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, lease.port()));
        assert!(listener.is_ok());
    }
}
