// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Short-held spinlocks for the per-mailbox, ready-list, and wheel critical
//! sections (spec §5). Critical sections here are O(1) except ring growth
//! and bucket-list detachment, both strictly bounded, so a spinlock beats a
//! parking mutex under the expected contention: see spec §9 ("Spinlocks").
//!
//! This wraps [`spin::Mutex`] rather than reimplementing a test-and-set
//! loop, the same way the teacher wraps `spin::Mutex` in its own
//! `sync::spinlock::SpinLock` — the interrupt-disabling guard the teacher
//! layers on top is a bare-metal concern this crate has no use for, so it
//! is dropped.

use spin::mutex::{SpinMutex, SpinMutexGuard};

#[derive(Debug, Default)]
pub struct SpinLock<T: ?Sized> {
    inner: SpinMutex<T>,
}

pub type SpinLockGuard<'a, T> = SpinMutexGuard<'a, T>;

impl<T> SpinLock<T> {
    pub const fn new(val: T) -> Self {
        Self {
            inner: SpinMutex::new(val),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        self.inner.lock()
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.inner.try_lock()
    }
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}
