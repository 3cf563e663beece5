use colored::Color;
use comfy_table::Color as TableColor;

/// Glyph and color of one kind of status line.
#[derive(Clone, Copy)]
pub struct Tone {
    pub icon: &'static str,
    pub color: Color,
}

pub const SUCCESS: Tone = Tone {
    icon: "✓",
    color: Color::Green,
};
pub const FAILURE: Tone = Tone {
    icon: "✗",
    color: Color::Red,
};
pub const WARNING: Tone = Tone {
    icon: "⚠",
    color: Color::Yellow,
};
pub const NOTE: Tone = Tone {
    icon: "ℹ",
    color: Color::Blue,
};
pub const TRACE: Tone = Tone {
    icon: "→",
    color: Color::BrightBlack,
};
pub const PROGRESS: Tone = Tone {
    icon: "⟳",
    color: Color::Cyan,
};
pub const BULLET: Tone = Tone {
    icon: "•",
    color: Color::BrightBlack,
};

pub const HEADING: Color = Color::BrightBlue;
pub const KEY: Color = Color::BrightCyan;
pub const VALUE: Color = Color::White;
/// Pending SQL echoed before confirmation.
pub const SQL: Color = Color::Magenta;

/// How a row of a migration plan is marked.
#[derive(Clone, Copy)]
pub struct PlanMark {
    pub icon: &'static str,
    pub color: TableColor,
}

/// Table created, or column or index added.
pub const ADDED: PlanMark = PlanMark {
    icon: "+",
    color: TableColor::Green,
};
pub const REMOVED: PlanMark = PlanMark {
    icon: "-",
    color: TableColor::Red,
};
pub const CHANGED: PlanMark = PlanMark {
    icon: "~",
    color: TableColor::Yellow,
};
pub const CURRENT: PlanMark = PlanMark {
    icon: "✓",
    color: TableColor::DarkGrey,
};
