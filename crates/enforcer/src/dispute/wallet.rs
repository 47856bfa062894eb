use std::sync::atomic::{AtomicU64, Ordering};

use enforcer_interface::Submission;
use primitive_types::H160;

/// Identity of a party and its submission counter.
///
/// Key management and signing happen elsewhere; this only hands out sequence numbers.
#[derive(Debug)]
pub struct Wallet {
    address: H160,
    next_nonce: AtomicU64,
}

impl Wallet {
    /// Creates a wallet whose first submission uses nonce 0.
    pub fn new(address: H160) -> Self {
        Self {
            address,
            next_nonce: AtomicU64::new(0),
        }
    }

    /// Address submissions are sent from.
    pub fn address(&self) -> H160 {
        self.address
    }

    /// Reserves a fresh nonce. A reserved nonce is never handed out again, whether or not the
    /// submission using it succeeds.
    pub fn reserve_nonce(&self) -> Submission {
        Submission {
            from: self.address,
            nonce: self.next_nonce.fetch_add(1, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn nonces_are_unique_across_threads() {
        let wallet = Arc::new(Wallet::new(H160::repeat_byte(7)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let wallet = wallet.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|_| wallet.reserve_nonce().nonce)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let nonces: HashSet<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(nonces.len(), 1000);
        assert_eq!(wallet.reserve_nonce().nonce, 1000);
    }
}
