//! This module contains the bounded max-heap that keeps the k best candidates of a query.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use ordered_float::OrderedFloat; // For using f64 in BinaryHeap

/// Represents an element in the KBestNeighbors heap, pairing a squared distance with data.
#[derive(Debug)]
pub struct HeapElement<P> {
    pub distance: OrderedFloat<f64>, // Max-heap stores by distance
    pub data: P,
}

impl<P: Ord> PartialEq for HeapElement<P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl<P: Ord> Eq for HeapElement<P> {}

impl<P: Ord> PartialOrd for HeapElement<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Ord> Ord for HeapElement<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Largest distance on top; among equal distances the larger data is
        // considered worse, so ties keep the smallest ids.
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.data.cmp(&other.data))
    }
}

/// Manages a collection of the K "best" (smallest distance) items seen so far.
#[derive(Debug)]
pub struct KBestNeighbors<P> {
    capacity: usize,
    heap: BinaryHeap<HeapElement<P>>,
}

impl<P: Ord> KBestNeighbors<P> {
    pub fn new(capacity: usize) -> Self {
        KBestNeighbors {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1), // +1 for the push-then-pop in `add`
        }
    }

    /// Pushes a candidate and evicts the worst one if the heap grew past capacity.
    pub fn add(&mut self, distance: f64, point_data: P) {
        if self.capacity == 0 {
            return;
        }
        self.heap.push(HeapElement { distance: OrderedFloat(distance), data: point_data });
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Worst kept distance once the heap holds `capacity` items.
    pub fn current_farthest_distance(&self) -> Option<f64> {
        if self.is_full() {
            self.heap.peek().map(|heap_elem| heap_elem.distance.0)
        } else {
            None // Not full yet, effectively infinite radius for pruning
        }
    }

    /// Drains the heap into `(distance, data)` pairs, nearest first.
    pub fn into_sorted_vec(self) -> Vec<(f64, P)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|elem| (elem.distance.0, elem.data))
            .collect()
    }

    /// Returns the current number of neighbors stored.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
