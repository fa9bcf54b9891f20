use alloc::{sync::Arc, vec::Vec};
use parking_lot::{Mutex, MutexGuard};

use super::{ProtectOptions, Result, SecurityContext};

/// A security context shared between threads.
///
/// Every operation holds the lock from reading the sender sequence number
/// until it's committed, so no two messages are sealed with the same one.
#[derive(Clone)]
pub struct SharedContext {
    inner: Arc<Mutex<SecurityContext>>,
}

impl SharedContext {
    pub fn new(context: SecurityContext) -> SharedContext {
        SharedContext {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// Locks the context for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, SecurityContext> {
        self.inner.lock()
    }

    pub fn protect_request(
        &self,
        coap_msg: &[u8],
        options: &ProtectOptions,
    ) -> Result<Vec<u8>> {
        self.inner.lock().protect_request(coap_msg, options)
    }

    pub fn protect_response(
        &self,
        coap_msg: &[u8],
        request: &[u8],
        options: &ProtectOptions,
    ) -> Result<Vec<u8>> {
        self.inner.lock().protect_response(coap_msg, request, options)
    }

    pub fn unprotect_request(&self, oscore_msg: &[u8]) -> Result<Vec<u8>> {
        self.inner.lock().unprotect_request(oscore_msg)
    }

    pub fn unprotect_response(
        &self,
        oscore_msg: &[u8],
        request: &[u8],
    ) -> Result<Vec<u8>> {
        self.inner.lock().unprotect_response(oscore_msg, request)
    }
}
