use std::sync::{Mutex, MutexGuard};

/// Useful functions for creating inmemory repositories

// A poisoned lock only means that another test thread panicked while holding it
pub fn lock<T>(collection: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    collection
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn insert<T: Clone>(val: &T, collection: &Mutex<Vec<T>>) {
    let mut collection = lock(collection);
    collection.push(val.clone());
}

pub fn find_by<T: Clone, F: FnMut(&T) -> bool>(
    collection: &Mutex<Vec<T>>,
    mut compare: F,
) -> Vec<T> {
    let collection = lock(collection);
    let mut items = Vec::new();
    for item in collection.iter() {
        if compare(item) {
            items.push(item.clone());
        }
    }
    items
}

pub fn delete_by<T, F: Fn(&T) -> bool>(collection: &Mutex<Vec<T>>, compare: F) -> usize {
    let mut collection = lock(collection);
    let before = collection.len();
    collection.retain(|item| !compare(item));
    before - collection.len()
}

/// Applies `update` to every item matching `compare` and returns how many
/// items reported a change
pub fn update_many<T, F: Fn(&T) -> bool, U: Fn(&mut T) -> bool>(
    collection: &Mutex<Vec<T>>,
    compare: F,
    update: U,
) -> usize {
    let mut collection = lock(collection);
    let mut updated = 0;
    for item in collection.iter_mut() {
        if compare(item) && update(item) {
            updated += 1;
        }
    }
    updated
}
