//! Dismissal checks, roving keyboard focus and search state.

use std::cell::RefCell;
use std::rc::Rc;

use crate::host::{Host, Key, NodeId};

/// Whether a pointer-down at `target` lies outside both the panel and the
/// trigger. Missing nodes count as not containing anything.
pub fn is_outside(
    host: &dyn Host,
    target: NodeId,
    panel: Option<NodeId>,
    trigger: Option<NodeId>,
) -> bool {
    let inside = |node: Option<NodeId>| node.is_some_and(|node| host.contains(node, target));
    !inside(panel) && !inside(trigger)
}

/// Case-insensitive substring match. An empty query matches everything.
pub fn matches(label: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    label.to_lowercase().contains(&query.to_lowercase())
}

/// Items whose label matches `query`, in their original order.
pub fn filter_by_label<'a, T>(
    items: &'a [T],
    query: &str,
    label: impl Fn(&T) -> &str,
) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| matches(label(*item), query))
        .collect()
}

/// Keyboard focus over a row of items, some of which may be disabled.
///
/// Positions are indices into the full item list; disabled entries are never
/// returned. Movement wraps around at both ends.
#[derive(Debug, Clone, Default)]
pub struct RovingFocus {
    enabled: Vec<bool>,
    current: Option<usize>,
}

impl RovingFocus {
    pub fn new(enabled: Vec<bool>) -> Self {
        Self {
            enabled,
            current: None,
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Point focus at `index` if it is enabled.
    pub fn set_current(&mut self, index: usize) -> bool {
        if self.enabled.get(index).copied().unwrap_or(false) {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn first(&mut self) -> Option<usize> {
        let index = self.enabled.iter().position(|&enabled| enabled)?;
        self.current = Some(index);
        Some(index)
    }

    pub fn last(&mut self) -> Option<usize> {
        let index = self.enabled.iter().rposition(|&enabled| enabled)?;
        self.current = Some(index);
        Some(index)
    }

    pub fn next(&mut self) -> Option<usize> {
        self.step(1)
    }

    pub fn prev(&mut self) -> Option<usize> {
        self.step(-1)
    }

    /// Apply a navigation key. Returns the newly focused index, or `None` for
    /// keys that are not navigation or when nothing is enabled.
    pub fn handle_key(&mut self, key: &Key) -> Option<usize> {
        match key {
            Key::ArrowDown => self.next(),
            Key::ArrowUp => self.prev(),
            Key::Home => self.first(),
            Key::End => self.last(),
            _ => None,
        }
    }

    fn step(&mut self, direction: isize) -> Option<usize> {
        let len = self.enabled.len() as isize;
        if len == 0 {
            return None;
        }

        // From nothing, down lands on the first slot and up on the last
        let mut index = match self.current {
            Some(current) => current as isize + direction,
            None if direction > 0 => 0,
            None => len - 1,
        };

        for _ in 0..len {
            index = index.rem_euclid(len);
            if self.enabled[index as usize] {
                self.current = Some(index as usize);
                return self.current;
            }
            index += direction;
        }
        None
    }
}

pub type SearchCallback = Rc<dyn Fn(&str)>;

/// Query text plus the caller's filter callback.
///
/// The callback is invoked with no internal borrow held, so it may read the
/// state back.
#[derive(Default)]
pub struct SearchState {
    query: RefCell<String>,
    on_search: RefCell<Option<SearchCallback>>,
}

impl SearchState {
    pub fn new(on_search: Option<SearchCallback>) -> Self {
        Self {
            query: RefCell::new(String::new()),
            on_search: RefCell::new(on_search),
        }
    }

    pub fn set_callback(&self, on_search: Option<SearchCallback>) {
        *self.on_search.borrow_mut() = on_search;
    }

    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }

    /// Text typed into the search input.
    pub fn input(&self, value: &str) {
        *self.query.borrow_mut() = value.to_string();
        self.notify(value);
    }

    /// Reset the query and report `""` to the caller.
    pub fn clear(&self) {
        self.query.borrow_mut().clear();
        self.notify("");
    }

    fn notify(&self, query: &str) {
        let callback = self.on_search.borrow().clone();
        if let Some(callback) = callback {
            callback(query);
        }
    }
}
