use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use stopwatch_core::{format_time, Snapshot, StopwatchStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    /// The lap still in progress.
    Live,
    Fastest,
    Slowest,
    Plain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LapRow {
    pub label: String,
    pub split: String,
    pub total: String,
    pub mark: Mark,
}

/// Rows for the lap table: the live lap on top, then recorded laps newest first.
/// The live row is shown even before the clock has been started.
pub fn lap_rows(snapshot: &Snapshot) -> Vec<LapRow> {
    let extremes = snapshot.split_extremes();
    let mut rows = Vec::with_capacity(snapshot.laps.len() + 1);
    rows.push(LapRow {
        label: format!("Lap {}", snapshot.current_lap_index()),
        split: format_time(snapshot.current_lap_ms()),
        total: format_time(snapshot.elapsed_ms),
        mark: Mark::Live,
    });
    for lap in snapshot.laps {
        let mark = match extremes {
            Some((fastest, _)) if lap.split_time == fastest => Mark::Fastest,
            Some((_, slowest)) if lap.split_time == slowest => Mark::Slowest,
            _ => Mark::Plain,
        };
        rows.push(LapRow {
            label: format!("Lap {}", lap.lap_index),
            split: format_time(lap.split_time),
            total: format_time(lap.end_time),
            mark,
        });
    }
    rows
}

pub fn status_label(status: StopwatchStatus) -> &'static str {
    match status {
        StopwatchStatus::Idle => "ready",
        StopwatchStatus::Running => "running",
        StopwatchStatus::Paused => "paused",
    }
}

pub fn footer(status: StopwatchStatus) -> &'static str {
    match status {
        StopwatchStatus::Idle => "space=start  q=quit",
        StopwatchStatus::Running => "space=stop  l/enter=lap  r=reset  q=quit",
        StopwatchStatus::Paused => "space=start  r/enter=reset  q=quit",
    }
}

pub fn draw_stopwatch<W: Write>(out: &mut W, snapshot: &Snapshot, (width, height): (u16, u16)) -> io::Result<()> {
    queue!(out, Clear(ClearType::All))?;

    // Header
    queue!(
        out,
        MoveTo(2, 1),
        SetAttribute(Attribute::Bold),
        Print("STOPWATCH"),
        SetAttribute(Attribute::Reset),
    )?;

    // Time display
    queue!(
        out,
        MoveTo(4, 3),
        SetAttribute(Attribute::Bold),
        Print(format_time(snapshot.elapsed_ms)),
        SetAttribute(Attribute::Reset),
        MoveTo(4, 4),
        Print(status_label(snapshot.status)),
    )?;

    // Lap table, clipped to the space above the footer
    let list_top = 6u16;
    let list_bottom = height.saturating_sub(2);
    let max_visible = list_bottom.saturating_sub(list_top) as usize;
    let clip = width.saturating_sub(4) as usize;

    for (i, row) in lap_rows(snapshot).iter().take(max_visible).enumerate() {
        let line = format!("{:<8} {:>11}  {:>11}", row.label, row.split, row.total);
        let line: String = line.chars().take(clip).collect();
        queue!(out, MoveTo(4, list_top + i as u16))?;
        match row.mark {
            Mark::Fastest => queue!(out, SetForegroundColor(Color::Green))?,
            Mark::Slowest => queue!(out, SetForegroundColor(Color::Red))?,
            Mark::Live => queue!(out, SetAttribute(Attribute::Bold))?,
            Mark::Plain => {}
        }
        queue!(out, Print(line), ResetColor, SetAttribute(Attribute::Reset))?;
    }

    // Footer
    queue!(
        out,
        MoveTo(2, height.saturating_sub(1)),
        SetAttribute(Attribute::Dim),
        Print(footer(snapshot.status)),
        SetAttribute(Attribute::Reset),
    )?;

    out.flush()
}
