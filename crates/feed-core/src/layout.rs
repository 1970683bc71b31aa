//! Masonry layout: how many columns a viewport gets and which column the
//! next card goes into.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{constant::MAX_COLUMNS, document::Document, prefs::LayoutPreference};

/// Minimum viewport widths (in px) at which each wider class starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakpoints {
    pub tablet: u32,
    pub desktop: u32,
    pub wide: u32,
    pub ultra: u32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            tablet: 768,
            desktop: 1100,
            wide: 1500,
            ultra: 1900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WidthClass {
    Mobile,
    Tablet,
    Desktop,
    Wide,
    Ultra,
}

impl WidthClass {
    pub fn classify(width: u32, breakpoints: &Breakpoints) -> Self {
        if width >= breakpoints.ultra {
            WidthClass::Ultra
        } else if width >= breakpoints.wide {
            WidthClass::Wide
        } else if width >= breakpoints.desktop {
            WidthClass::Desktop
        } else if width >= breakpoints.tablet {
            WidthClass::Tablet
        } else {
            WidthClass::Mobile
        }
    }

    pub fn column_count(self) -> usize {
        match self {
            WidthClass::Mobile => 1,
            WidthClass::Tablet => 2,
            WidthClass::Desktop => 3,
            WidthClass::Wide => 4,
            WidthClass::Ultra => MAX_COLUMNS,
        }
    }
}

/// Number of columns for a viewport `width`. A step function of width.
pub fn column_count_for(width: u32, breakpoints: &Breakpoints) -> usize {
    WidthClass::classify(width, breakpoints).column_count()
}

/// How cards are laid out in the feed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// One plain flow container; used on mobile and for the list preference.
    Flow,
    /// `n` balanced columns.
    Columns(usize),
}

impl LayoutMode {
    pub fn for_class(class: WidthClass, preference: LayoutPreference) -> Self {
        match (class, preference) {
            (WidthClass::Mobile, _) | (_, LayoutPreference::List) => LayoutMode::Flow,
            (class, LayoutPreference::Grid) => LayoutMode::Columns(class.column_count()),
        }
    }

    pub fn container_count(self) -> usize {
        match self {
            LayoutMode::Flow => 1,
            LayoutMode::Columns(count) => count.max(1),
        }
    }
}

/// What the layout needs to know about a rendered column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMetrics {
    pub height: u32,
    pub children: usize,
}

/// Index of the column with the smallest height. Ties go to the column
/// with fewer children, then to the leftmost, so cards fan out round-robin
/// before any height is known.
pub fn shortest_column(columns: &[ColumnMetrics]) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .min_by_key(|(_, column)| (column.height, column.children))
        .map(|(idx, _)| idx)
}

/// Owns the current column set of a feed.
#[derive(Debug)]
pub struct Masonry {
    breakpoints: Breakpoints,
    class: WidthClass,
    preference: LayoutPreference,
}

impl Masonry {
    pub fn new(breakpoints: Breakpoints, width: u32, preference: LayoutPreference) -> Self {
        Self {
            class: WidthClass::classify(width, &breakpoints),
            breakpoints,
            preference,
        }
    }

    pub fn class(&self) -> WidthClass {
        self.class
    }

    pub fn preference(&self) -> LayoutPreference {
        self.preference
    }

    pub fn mode(&self) -> LayoutMode {
        LayoutMode::for_class(self.class, self.preference)
    }

    pub fn classify(&self, width: u32) -> WidthClass {
        WidthClass::classify(width, &self.breakpoints)
    }

    /// Record a new width; returns whether the resulting layout mode changed.
    pub fn set_width(&mut self, width: u32) -> bool {
        let before = self.mode();
        self.class = self.classify(width);
        before != self.mode()
    }

    /// Record a new preference; returns whether the layout mode changed.
    pub fn set_preference(&mut self, preference: LayoutPreference) -> bool {
        let before = self.mode();
        self.preference = preference;
        before != self.mode()
    }

    /// Destroy every column container and create fresh, empty ones for the
    /// current mode. Cards are not carried over.
    pub fn rebuild<D: Document + ?Sized>(&self, doc: &mut D) {
        let mode = self.mode();
        debug!(?mode, "rebuilding columns");
        doc.reset_columns(mode);
    }

    /// Column that should receive the next card.
    pub fn place<D: Document + ?Sized>(&self, doc: &D) -> usize {
        match self.mode() {
            LayoutMode::Flow => 0,
            LayoutMode::Columns(_) => shortest_column(&doc.column_metrics()).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_count_is_a_monotonic_step_function() {
        let breakpoints = Breakpoints::default();
        let mut previous = 0;
        for width in (0..=3000).step_by(10) {
            let count = column_count_for(width, &breakpoints);
            assert_eq!(count, column_count_for(width, &breakpoints));
            assert!(count >= previous, "count dropped at {width}px");
            assert!((1..=MAX_COLUMNS).contains(&count));
            previous = count;
        }
        assert_eq!(column_count_for(320, &breakpoints), 1);
        assert_eq!(column_count_for(767, &breakpoints), 1);
        assert_eq!(column_count_for(768, &breakpoints), 2);
        assert_eq!(column_count_for(1280, &breakpoints), 3);
        assert_eq!(column_count_for(1600, &breakpoints), 4);
        assert_eq!(column_count_for(2560, &breakpoints), MAX_COLUMNS);
    }

    #[test]
    fn mobile_and_list_use_flow() {
        assert_eq!(
            LayoutMode::for_class(WidthClass::Mobile, LayoutPreference::Grid),
            LayoutMode::Flow
        );
        assert_eq!(
            LayoutMode::for_class(WidthClass::Ultra, LayoutPreference::List),
            LayoutMode::Flow
        );
        assert_eq!(
            LayoutMode::for_class(WidthClass::Wide, LayoutPreference::Grid),
            LayoutMode::Columns(4)
        );
    }

    #[test]
    fn shortest_column_breaks_ties_by_children_then_position() {
        let empty = vec![ColumnMetrics::default(); 3];
        assert_eq!(shortest_column(&empty), Some(0));

        let one_filled = vec![
            ColumnMetrics {
                height: 0,
                children: 1,
            },
            ColumnMetrics::default(),
            ColumnMetrics::default(),
        ];
        assert_eq!(shortest_column(&one_filled), Some(1));

        let by_height = vec![
            ColumnMetrics {
                height: 300,
                children: 1,
            },
            ColumnMetrics {
                height: 120,
                children: 2,
            },
            ColumnMetrics {
                height: 200,
                children: 1,
            },
        ];
        assert_eq!(shortest_column(&by_height), Some(1));
        assert_eq!(shortest_column(&[]), None);
    }

    #[test]
    fn set_width_reports_mode_changes_only() {
        let mut masonry = Masonry::new(Breakpoints::default(), 1200, LayoutPreference::Grid);
        assert_eq!(masonry.mode(), LayoutMode::Columns(3));
        assert!(!masonry.set_width(1300));
        assert!(masonry.set_width(1600));
        assert_eq!(masonry.mode(), LayoutMode::Columns(4));
        assert!(masonry.set_preference(LayoutPreference::List));
        assert!(!masonry.set_width(400));
        assert_eq!(masonry.mode(), LayoutMode::Flow);
    }
}
