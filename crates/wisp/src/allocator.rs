//! The allocator contract (spec.md §4.1): a minimal `realloc`/`free` trait
//! any host can implement, plus a bump arena built over it.
//!
//! Neither the parser nor the AST builder actually routes through an
//! `Arena<T>` here — they build ordinary `Vec`/`Box` trees, letting the
//! target language's own ownership model stand in for the source's
//! manually-walked chunk lists, per REDESIGN FLAGS in spec.md §9. This
//! module exists to carry the *contract* spec.md §4.1 calls for (and to
//! give an embedder a documented seam for a custom allocator), not because
//! `wisp`'s own parse/compile arenas are implemented on top of it.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// `realloc`/`free` over raw bytes. `size = 0` frees; `old = None`
/// allocates. Implementations must be reentrant within a single owner (the
/// same requirement the spec places on the source's allocator vtable).
///
/// # Safety
///
/// Implementors must return a pointer allocated with a compatible global
/// allocator (or document an incompatible one), sized for at least `size`
/// bytes with `align` alignment, and must not alias any other live
/// allocation returned by the same `Allocator`.
pub unsafe trait Allocator {
    /// Grows, shrinks, or allocates a block. Returns `None` on allocation
    /// failure; `size = 0` always succeeds and returns `None` having freed
    /// `old` (if present).
    ///
    /// # Safety
    ///
    /// `old`, if present, must have been returned by this same allocator and
    /// not already freed.
    unsafe fn realloc(&self, old: Option<NonNull<u8>>, old_layout: Option<Layout>, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` must have been returned by this same allocator and not already
    /// freed.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The default allocator: a thin wrapper over the process-wide global
/// allocator. The ambient convenience every embedding needs; a host that
/// wants its own memory budget supplies a different [`Allocator`] instead
/// (REDESIGN FLAGS: "global default allocator -> explicit injection").
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

// SAFETY: delegates directly to `std::alloc`, which satisfies the trait's
// sizing/alignment/aliasing contract by construction.
unsafe impl Allocator for SystemAllocator {
    unsafe fn realloc(&self, old: Option<NonNull<u8>>, old_layout: Option<Layout>, size: usize, align: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            if let (Some(ptr), Some(layout)) = (old, old_layout) {
                // SAFETY: caller guarantees `ptr`/`layout` match a prior
                // allocation from this allocator.
                unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
            }
            return None;
        }
        let new_layout = Layout::from_size_align(size, align).ok()?;
        let raw = match (old, old_layout) {
            (Some(ptr), Some(layout)) => {
                // SAFETY: caller guarantees `ptr` was allocated with
                // `layout` by this allocator and is still live.
                unsafe { alloc::realloc(ptr.as_ptr(), layout, size) }
            }
            _ => {
                // SAFETY: `new_layout` has nonzero size, checked above.
                unsafe { alloc::alloc(new_layout) }
            }
        };
        NonNull::new(raw)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the trait's own safety contract.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

/// A bump-allocating arena of `T`, backed by growable chunks. `reset` drops
/// every value and frees every chunk in one operation; there is no
/// per-value free. Used by the spec for parse trees and AST nodes; `wisp`'s
/// actual parser/AST instead lean on `Vec`/`Box` (see module docs), but the
/// type is provided for embeddings that want bulk-reset semantics for their
/// own scratch data (e.g. a REPL's per-line scratch buffers).
#[derive(Debug)]
pub struct Arena<T> {
    chunks: Vec<Vec<T>>,
    chunk_size: usize,
}

impl<T> Arena<T> {
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self { chunks: vec![], chunk_size: chunk_size.max(1) }
    }

    /// Appends `value`, growing a new chunk if the current one is full.
    /// Returns a stable index: `(chunk, offset)`.
    pub fn allocate(&mut self, value: T) -> (usize, usize) {
        if self.chunks.last().is_none_or(|c| c.len() >= self.chunk_size) {
            self.chunks.push(Vec::with_capacity(self.chunk_size));
        }
        let chunk = self.chunks.last_mut().expect("just ensured a chunk exists");
        chunk.push(value);
        (self.chunks.len() - 1, chunk.len() - 1)
    }

    #[must_use]
    pub fn get(&self, idx: (usize, usize)) -> &T {
        &self.chunks[idx.0][idx.1]
    }

    /// Frees every chunk at once. All previously returned indices become
    /// invalid.
    pub fn reset(&mut self) {
        self.chunks.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Vec::is_empty)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_get_round_trips() {
        let mut arena: Arena<i32> = Arena::new(4);
        let a = arena.allocate(10);
        let b = arena.allocate(20);
        assert_eq!(*arena.get(a), 10);
        assert_eq!(*arena.get(b), 20);
    }

    #[test]
    fn reset_drops_everything_at_once() {
        let mut arena: Arena<String> = Arena::new(2);
        arena.allocate("a".to_owned());
        arena.allocate("b".to_owned());
        arena.allocate("c".to_owned());
        assert_eq!(arena.len(), 3);
        arena.reset();
        assert!(arena.is_empty());
    }

    #[test]
    fn system_allocator_round_trips_a_block() {
        let alloc = SystemAllocator;
        let layout = Layout::from_size_align(64, 8).expect("valid layout");
        // SAFETY: fresh allocation, freed below with the same layout.
        let ptr = unsafe { alloc.realloc(None, None, 64, 8) }.expect("allocation succeeds");
        // SAFETY: `ptr` was just allocated by `alloc` with `layout`.
        unsafe { alloc.free(ptr, layout) };
    }
}
