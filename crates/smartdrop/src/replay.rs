//! Scripted replay of user input through a [`HeadlessHost`].
//!
//! A script is TOML: viewport, trigger geometry, menu content and a list of
//! steps. Each step produces a [`Snapshot`] of the dropdown afterwards.
//!
//! ```toml
//! [viewport]
//! width = 1280
//! height = 800
//!
//! [trigger]
//! x = 100
//! y = 650
//! width = 120
//! height = 50
//!
//! [[content.entries]]
//! kind = "item"
//! label = "Personal"
//!
//! [[steps]]
//! action = "click_trigger"
//!
//! [[steps]]
//! action = "frames"
//! ```

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smartdrop_core::Config;
use tracing::{debug, info};

use crate::content::ContentConfig;
use crate::controller::{Dropdown, DropdownOptions, OverlayView};
use crate::error::{Error, Result};
use crate::host::{Event, HeadlessHost, Host, Key, NodeId};
use crate::interaction::filter_by_label;
use crate::layout_math::{Align, Rect, Size, Viewport, ViewportClass};
use crate::presence::PresencePhase;
use crate::primitives::{Item, MenuEntry};
use crate::scroll_lock::LOCKED_PROPERTY;

/// Shown when a search leaves nothing to list.
const NO_RESULTS: &str = "No results";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub viewport: ViewportSpec,
    pub trigger: RectSpec,
    /// Size the host reports for the overlay panel.
    #[serde(default)]
    pub panel: Option<SizeSpec>,
    #[serde(default)]
    pub content: ContentSpec,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportSpec {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RectSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeSpec {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentSpec {
    pub title: Option<String>,
    pub align: Align,
    pub offset_px: Option<f64>,
    pub searchable: bool,
    pub search_placeholder: Option<String>,
    pub entries: Vec<EntrySpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum EntrySpec {
    Item {
        label: String,
        #[serde(default)]
        selected: bool,
        #[serde(default)]
        disabled: bool,
        #[serde(default)]
        destructive: bool,
        #[serde(default)]
        keep_open: bool,
    },
    Label {
        text: String,
    },
    Separator,
    Empty {
        text: String,
    },
}

fn default_release() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Open,
    Close,
    Toggle,
    ClickTrigger,
    /// Pointer press on the page behind the overlay.
    ClickOutside,
    ClickBackdrop,
    ClickItem {
        label: String,
    },
    /// Run animation frames until none are queued.
    Frames,
    Advance {
        ms: u64,
    },
    Key {
        key: String,
    },
    /// Touch drag on the sheet handle. `release = false` leaves the finger
    /// down.
    Drag {
        from: f64,
        to: f64,
        #[serde(default = "default_release")]
        release: bool,
    },
    Search {
        query: String,
    },
    ClearSearch,
    Resize {
        width: f64,
        height: f64,
    },
    Scroll,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Open => "open",
            Step::Close => "close",
            Step::Toggle => "toggle",
            Step::ClickTrigger => "click_trigger",
            Step::ClickOutside => "click_outside",
            Step::ClickBackdrop => "click_backdrop",
            Step::ClickItem { .. } => "click_item",
            Step::Frames => "frames",
            Step::Advance { .. } => "advance",
            Step::Key { .. } => "key",
            Step::Drag { .. } => "drag",
            Step::Search { .. } => "search",
            Step::ClearSearch => "clear_search",
            Step::Resize { .. } => "resize",
            Step::Scroll => "scroll",
        }
    }
}

impl Script {
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Script(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Script(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&source)
    }
}

/// Dropdown state after one step.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub step: usize,
    pub action: &'static str,
    pub time_ms: u64,
    pub open: bool,
    pub class: ViewportClass,
    pub phase: PresencePhase,
    pub mounted: bool,
    pub visible: bool,
    pub view: Option<OverlayView>,
    pub focused: Option<String>,
    pub query: String,
    pub last_selected: Option<String>,
    pub scroll_locked: bool,
    pub listeners: usize,
    pub pending_timers: usize,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<3} {:<14} t={:>5}ms  {:<5} {:<7} {:<8}",
            self.step,
            self.action,
            self.time_ms,
            if self.open { "open" } else { "shut" },
            match self.class {
                ViewportClass::Desktop => "desktop",
                ViewportClass::Mobile => "mobile",
            },
            format!("{:?}", self.phase).to_lowercase(),
        )?;

        match &self.view {
            Some(OverlayView::Desktop(view)) => {
                if let Some(position) = view.position {
                    write!(
                        f,
                        "  top={} left={}{}",
                        position.top,
                        position.left,
                        if position.flipped { " flipped" } else { "" }
                    )?;
                }
            }
            Some(OverlayView::Mobile(view)) => {
                if view.offscreen {
                    write!(f, "  sheet=offscreen")?;
                } else {
                    write!(f, "  sheet={}px", view.translate_y)?;
                }
                if view.drag.is_some() {
                    write!(f, " dragging")?;
                }
            }
            None => {}
        }

        if let Some(focused) = &self.focused {
            write!(f, "  focus={}", focused)?;
        }
        if !self.query.is_empty() {
            write!(f, "  query={:?}", self.query)?;
        }
        if let Some(selected) = &self.last_selected {
            write!(f, "  selected={}", selected)?;
        }
        if self.scroll_locked {
            write!(f, "  scroll-locked")?;
        }
        write!(
            f,
            "  listeners={} timers={}",
            self.listeners, self.pending_timers
        )
    }
}

/// Live state of a replay.
pub struct Session {
    host: Rc<HeadlessHost>,
    dropdown: Rc<Dropdown>,
    trigger: NodeId,
    page: NodeId,
    last_selected: Rc<RefCell<Option<String>>>,
}

impl Session {
    pub fn new(script: &Script, config: &Config) -> Result<Self> {
        let host = HeadlessHost::new(Viewport::new(script.viewport.width, script.viewport.height));
        if let Some(panel) = script.panel {
            host.set_default_size(Size {
                width: panel.width,
                height: panel.height,
            });
        }

        let page = host.add_element(Rect::new(
            0.0,
            0.0,
            script.viewport.width,
            script.viewport.height,
        ));
        let RectSpec {
            x,
            y,
            width,
            height,
        } = script.trigger;
        let trigger = host.add_element(Rect::new(x, y, width, height));

        let dropdown = Dropdown::new(host.clone(), config, DropdownOptions::default());
        dropdown.bind_trigger(trigger)?;

        let last_selected = Rc::new(RefCell::new(None));
        let entries = build_entries(&script.content.entries, &last_selected);

        let mut content = ContentConfig {
            title: script.content.title.clone(),
            align: script.content.align,
            offset_px: script.content.offset_px,
            searchable: script.content.searchable,
            search_placeholder: script.content.search_placeholder.clone(),
            on_search: None,
        };
        if content.searchable {
            let all = entries.clone();
            let weak = Rc::downgrade(&dropdown);
            content = content.on_search(move |query| {
                if let Some(dropdown) = weak.upgrade() {
                    dropdown.set_entries(filter_entries(&all, query));
                }
            });
        }
        dropdown.render_content(content, entries);

        Ok(Self {
            host,
            dropdown,
            trigger,
            page,
            last_selected,
        })
    }

    pub fn host(&self) -> &Rc<HeadlessHost> {
        &self.host
    }

    pub fn dropdown(&self) -> &Rc<Dropdown> {
        &self.dropdown
    }

    pub fn apply(&self, step: &Step) -> Result<()> {
        match step {
            Step::Open => self.dropdown.open(),
            Step::Close => self.dropdown.close(),
            Step::Toggle => self.dropdown.toggle(),
            Step::ClickTrigger => self.host.click(self.trigger),
            Step::ClickOutside => self.host.click(self.page),
            Step::ClickBackdrop => {
                let backdrop = self
                    .dropdown
                    .nodes()
                    .and_then(|nodes| nodes.backdrop)
                    .ok_or_else(|| Error::Script("no backdrop is mounted".to_string()))?;
                self.host.click(backdrop);
            }
            Step::ClickItem { label } => {
                let node = self.row_node(label)?;
                self.host.click(node);
            }
            Step::Frames => self.host.flush_frames(),
            Step::Advance { ms } => self.host.advance_ms(*ms),
            Step::Key { key } => self.host.dispatch(Event::KeyDown {
                key: Key::from_name(key),
            }),
            Step::Drag { from, to, release } => {
                let handle = self
                    .dropdown
                    .nodes()
                    .and_then(|nodes| nodes.handle)
                    .ok_or_else(|| Error::Script("drag needs a mounted bottom sheet".to_string()))?;
                self.host.dispatch(Event::TouchStart {
                    target: handle,
                    y: *from,
                });
                self.host.dispatch(Event::TouchMove {
                    target: handle,
                    y: *to,
                });
                if *release {
                    self.host.dispatch(Event::TouchEnd { target: handle });
                }
            }
            Step::Search { query } => {
                let input = self
                    .dropdown
                    .nodes()
                    .and_then(|nodes| nodes.search_input)
                    .ok_or_else(|| Error::Script("no search input is mounted".to_string()))?;
                self.host.dispatch(Event::Input {
                    target: input,
                    value: query.clone(),
                });
            }
            Step::ClearSearch => match self.dropdown.nodes().and_then(|n| n.clear_button) {
                Some(button) => self.host.click(button),
                None => self.dropdown.clear_search(),
            },
            Step::Resize { width, height } => self.host.resize(*width, *height),
            Step::Scroll => self.host.dispatch(Event::Scroll { target: None }),
        }
        Ok(())
    }

    pub fn snapshot(&self, step: usize, action: &'static str) -> Snapshot {
        let record = self.dropdown.presence();
        let entries = self.dropdown.entries();
        let focused = self
            .dropdown
            .focused_entry()
            .and_then(|index| entries.get(index))
            .and_then(|entry| entry.text().map(str::to_string));

        Snapshot {
            step,
            action,
            time_ms: self.host.now().as_millis() as u64,
            open: self.dropdown.is_open(),
            class: self.dropdown.viewport_class(),
            phase: self.dropdown.phase(),
            mounted: record.mounted,
            visible: record.visible,
            view: self.dropdown.view(),
            focused,
            query: self.dropdown.search_query(),
            last_selected: self.last_selected.borrow().clone(),
            scroll_locked: self.host.root_style(LOCKED_PROPERTY).is_some(),
            listeners: self.host.listener_count(),
            pending_timers: self.host.pending_timers(),
        }
    }

    fn row_node(&self, label: &str) -> Result<NodeId> {
        let nodes = self
            .dropdown
            .nodes()
            .ok_or_else(|| Error::Script("menu is not mounted".to_string()))?;
        nodes
            .rows
            .into_iter()
            .find(|node| self.host.attribute(*node, "data-label").as_deref() == Some(label))
            .ok_or_else(|| Error::Script(format!("no item labelled {:?}", label)))
    }
}

/// Replay every step, returning one snapshot per step.
pub fn run(script: &Script, config: &Config) -> Result<Vec<Snapshot>> {
    let session = Session::new(script, config)?;
    let mut snapshots = Vec::with_capacity(script.steps.len());

    for (index, step) in script.steps.iter().enumerate() {
        debug!("Replay step {}: {:?}", index + 1, step);
        session.apply(step)?;
        snapshots.push(session.snapshot(index + 1, step.name()));
    }

    info!("Replayed {} steps", snapshots.len());
    Ok(snapshots)
}

fn build_entries(specs: &[EntrySpec], last_selected: &Rc<RefCell<Option<String>>>) -> Vec<MenuEntry> {
    specs
        .iter()
        .map(|spec| match spec {
            EntrySpec::Item {
                label,
                selected,
                disabled,
                destructive,
                keep_open,
            } => {
                let sink = last_selected.clone();
                let name = label.clone();
                Item::new(label.clone())
                    .selected(*selected)
                    .disabled(*disabled)
                    .destructive(*destructive)
                    .keep_open(*keep_open)
                    .on_select(move || *sink.borrow_mut() = Some(name.clone()))
                    .into()
            }
            EntrySpec::Label { text } => MenuEntry::label(text.clone()),
            EntrySpec::Separator => MenuEntry::Separator,
            EntrySpec::Empty { text } => MenuEntry::empty(text.clone()),
        })
        .collect()
}

/// Items matching `query`; headings and separators drop out while filtering.
fn filter_entries(all: &[MenuEntry], query: &str) -> Vec<MenuEntry> {
    if query.is_empty() {
        return all.to_vec();
    }

    let items: Vec<MenuEntry> = all
        .iter()
        .filter(|entry| entry.as_item().is_some())
        .cloned()
        .collect();
    let matched: Vec<MenuEntry> = filter_by_label(&items, query, |entry| entry.text().unwrap_or(""))
        .into_iter()
        .cloned()
        .collect();

    if matched.is_empty() {
        vec![MenuEntry::empty(NO_RESULTS)]
    } else {
        matched
    }
}
