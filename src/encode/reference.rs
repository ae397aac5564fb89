// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use std::sync::{Arc, Mutex};

use crate::api::EncoderStatus;
use crate::frame::Frame;

/// Index of a reconstructed picture in a [`RefPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RefHandle(usize);

#[derive(Debug)]
struct RefSlot {
  picture_number: u64,
  frame: Arc<Frame<u16>>,
  refcount: usize,
}

/// Reconstructed pictures shared between the picture that produced them
/// and the pictures predicting from them. A slot is freed when its last
/// holder releases it.
#[derive(Debug, Default)]
pub struct RefPool {
  slots: Mutex<Vec<Option<RefSlot>>>,
}

impl RefPool {
  pub fn new() -> Self {
    RefPool::default()
  }

  /// Stores `frame` with one holder, its producer.
  pub fn insert(
    &self, picture_number: u64, frame: Arc<Frame<u16>>,
  ) -> Result<RefHandle, EncoderStatus> {
    let mut slots = self.slots.lock().map_err(|_| EncoderStatus::Failure)?;
    let slot = RefSlot { picture_number, frame, refcount: 1 };
    let index = match slots.iter().position(Option::is_none) {
      Some(i) => {
        slots[i] = Some(slot);
        i
      }
      None => {
        slots.push(Some(slot));
        slots.len() - 1
      }
    };
    Ok(RefHandle(index))
  }

  /// Adds a holder to `handle` and returns its frame.
  pub fn acquire(
    &self, handle: RefHandle,
  ) -> Result<Arc<Frame<u16>>, EncoderStatus> {
    let mut slots = self.slots.lock().map_err(|_| EncoderStatus::Failure)?;
    let slot = slots
      .get_mut(handle.0)
      .and_then(Option::as_mut)
      .ok_or(EncoderStatus::Failure)?;
    slot.refcount += 1;
    Ok(slot.frame.clone())
  }

  /// Drops one holder of `handle`, freeing the slot with the last one.
  pub fn release(&self, handle: RefHandle) -> Result<(), EncoderStatus> {
    let mut slots = self.slots.lock().map_err(|_| EncoderStatus::Failure)?;
    let entry = slots.get_mut(handle.0).ok_or(EncoderStatus::Failure)?;
    let slot = entry.as_mut().ok_or(EncoderStatus::Failure)?;
    debug_assert!(slot.refcount > 0);
    slot.refcount -= 1;
    if slot.refcount == 0 {
      log::trace!("freeing reference of picture {}", slot.picture_number);
      *entry = None;
    }
    Ok(())
  }

  pub fn refcount(&self, handle: RefHandle) -> usize {
    self
      .slots
      .lock()
      .ok()
      .and_then(|s| s.get(handle.0).and_then(|e| e.as_ref().map(|e| e.refcount)))
      .unwrap_or(0)
  }

  /// Number of pictures still held.
  pub fn live(&self) -> usize {
    self.slots.lock().map_or(0, |s| s.iter().flatten().count())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn slots_are_freed_by_the_last_holder() {
    let pool = RefPool::new();
    let a = pool.insert(0, Arc::new(Frame::new(16, 16, 0))).unwrap();
    let b = pool.insert(1, Arc::new(Frame::new(16, 16, 0))).unwrap();
    assert_ne!(a, b);
    pool.acquire(a).unwrap();
    assert_eq!(pool.refcount(a), 2);
    pool.release(a).unwrap();
    assert_eq!(pool.live(), 2);
    pool.release(a).unwrap();
    assert_eq!(pool.live(), 1);
    assert!(pool.acquire(a).is_err());

    // Freed slots are reused.
    let c = pool.insert(2, Arc::new(Frame::new(16, 16, 0))).unwrap();
    assert_eq!(c, a);
    assert_eq!(pool.refcount(b), 1);
  }
}
