//! Display scripts: ordered directives and the stock attract-mode sequence.
//!
//! A script is plain data. [`run_script`] plays it against a
//! [`Readerboard`], one blocking directive at a time, and stops at the first
//! error so the supervisor can start over from a fresh device.

use crate::board::Readerboard;
use crate::error::Result;
use crate::leaderboard::ScoreRecord;
use crate::transport::Transport;
use crate::{Clock, SignGeometry};
use std::time::Duration;

// ── Directives ───────────────────────────────────────────────────────

/// One step of a script.
///
/// Drawing directives carry an optional buffer. `None` targets whatever the
/// board currently tracks as its back buffer; `Some(n)` names a buffer
/// outright and fails with `InvalidBuffer` unless `n` is 0 or 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    Clear {
        buffer: Option<u8>,
    },
    DrawText {
        x: u8,
        y: u8,
        text: String,
        buffer: Option<u8>,
    },
    SetLine {
        row: u8,
        pixels: Vec<u8>,
        buffer: Option<u8>,
    },
    Show {
        buffer: Option<u8>,
    },
    ScrollLeft {
        frames_per_pixel: u8,
        pixel_count: u8,
        buffer: Option<u8>,
    },
    ScrollRight {
        frames_per_pixel: u8,
        pixel_count: u8,
        buffer: Option<u8>,
    },
    /// Block for this long. Also used to wait out hardware scrolls.
    Pause(Duration),
}

impl Directive {
    pub fn clear() -> Self {
        Directive::Clear { buffer: None }
    }

    pub fn show() -> Self {
        Directive::Show { buffer: None }
    }

    pub fn text(x: u8, y: u8, text: impl Into<String>) -> Self {
        Directive::DrawText {
            x,
            y,
            text: text.into(),
            buffer: None,
        }
    }

    pub fn line(row: u8, pixels: Vec<u8>) -> Self {
        Directive::SetLine {
            row,
            pixels,
            buffer: None,
        }
    }

    pub fn scroll_left(frames_per_pixel: u8, pixel_count: u8) -> Self {
        Directive::ScrollLeft {
            frames_per_pixel,
            pixel_count,
            buffer: None,
        }
    }

    pub fn scroll_right(frames_per_pixel: u8, pixel_count: u8) -> Self {
        Directive::ScrollRight {
            frames_per_pixel,
            pixel_count,
            buffer: None,
        }
    }

    pub fn pause_ms(ms: u64) -> Self {
        Directive::Pause(Duration::from_millis(ms))
    }

    /// Pin this directive to an explicit buffer. Pauses are unaffected.
    pub fn on(mut self, target: u8) -> Self {
        match &mut self {
            Directive::Clear { buffer }
            | Directive::DrawText { buffer, .. }
            | Directive::SetLine { buffer, .. }
            | Directive::Show { buffer }
            | Directive::ScrollLeft { buffer, .. }
            | Directive::ScrollRight { buffer, .. } => *buffer = Some(target),
            Directive::Pause(_) => {}
        }
        self
    }
}

/// Play `directives` in order. The first failure abandons the rest.
pub fn run_script<T, C>(
    board: &mut Readerboard<T>,
    directives: &[Directive],
    clock: &mut C,
) -> Result<()>
where
    T: Transport,
    C: Clock + ?Sized,
{
    for directive in directives {
        match directive {
            Directive::Clear { buffer } => board.clear_buffer(*buffer)?,
            Directive::DrawText { x, y, text, buffer } => {
                board.draw_text(*x, *y, text.as_bytes(), *buffer)?
            }
            Directive::SetLine {
                row,
                pixels,
                buffer,
            } => board.set_line(*row, pixels, *buffer)?,
            Directive::Show { buffer } => board.show_buffer(*buffer)?,
            Directive::ScrollLeft {
                frames_per_pixel,
                pixel_count,
                buffer,
            } => board.scroll_left(*frames_per_pixel, *pixel_count, *buffer)?,
            Directive::ScrollRight {
                frames_per_pixel,
                pixel_count,
                buffer,
            } => board.scroll_right(*frames_per_pixel, *pixel_count, *buffer)?,
            Directive::Pause(duration) => clock.sleep(*duration),
        }
    }
    Ok(())
}

// ── Stock sequence ───────────────────────────────────────────────────

const FLASH_COUNT: usize = 5;

/// Clear, draw one line of text, and show it.
fn card(script: &mut Vec<Directive>, x: u8, text: impl Into<String>) {
    script.push(Directive::clear());
    script.push(Directive::text(x, 0, text));
    script.push(Directive::show());
}

fn blank(script: &mut Vec<Directive>) {
    script.push(Directive::clear());
    script.push(Directive::show());
}

/// The attract-mode loop shown on the sign. When a top score is known it
/// ends by announcing it.
pub fn message_sequence(top_score: Option<&ScoreRecord>) -> Vec<Directive> {
    let scroll_px = SignGeometry::default().cols;
    let mut script = Vec::new();

    card(&mut script, 9, "CHURCH OF ROBOTRON");
    script.push(Directive::pause_ms(1000));
    script.push(Directive::scroll_left(0, scroll_px));
    script.push(Directive::pause_ms(3000));

    card(&mut script, 32, "INSERT COIN");
    script.push(Directive::pause_ms(2000));

    for _ in 0..FLASH_COUNT {
        card(&mut script, 0, "PREPARE FOR JUDGEMENT");
        script.push(Directive::pause_ms(300));
        blank(&mut script);
        script.push(Directive::pause_ms(300));
    }

    blank(&mut script);
    script.push(Directive::pause_ms(1000));

    if let Some(top) = top_score {
        card(&mut script, 24, "MUTANT SAVIOR");
        script.push(Directive::pause_ms(2000));

        card(&mut script, 24, "TOP CANDIDATE");
        script.push(Directive::pause_ms(2000));

        card(&mut script, 32, top.to_string());
        script.push(Directive::pause_ms(2000));
        script.push(Directive::scroll_right(0, scroll_px));
        script.push(Directive::pause_ms(3000));
    }

    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;
    use crate::protocol::{BufferIndex, DisplayCommand};
    use crate::testing::FakeClock;
    use crate::transport::fake::FakeTransport;
    use pretty_assertions::assert_eq;

    fn decoded(board: &Readerboard<FakeTransport>) -> Vec<(DisplayCommand, BufferIndex)> {
        board
            .transport()
            .requests()
            .iter()
            .map(|r| DisplayCommand::decode(r).expect("decodable"))
            .collect()
    }

    #[test]
    fn clear_draw_show_hits_one_buffer() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();
        let script = vec![
            Directive::clear(),
            Directive::text(9, 0, "HELLO"),
            Directive::show(),
        ];

        run_script(&mut board, &script, &mut clock).unwrap();

        assert_eq!(
            decoded(&board),
            vec![
                (DisplayCommand::ClearBuffer, BufferIndex::Zero),
                (
                    DisplayCommand::DrawText {
                        x: 9,
                        y: 0,
                        message: b"HELLO".to_vec()
                    },
                    BufferIndex::Zero
                ),
                (DisplayCommand::ShowBuffer, BufferIndex::Zero),
            ]
        );
        assert_eq!(board.back_buffer(), BufferIndex::One);
    }

    #[test]
    fn consecutive_cards_alternate_buffers() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();
        let mut script = Vec::new();
        card(&mut script, 0, "A");
        card(&mut script, 0, "B");

        run_script(&mut board, &script, &mut clock).unwrap();

        let buffers: Vec<u8> = decoded(&board).iter().map(|(_, b)| b.as_u8()).collect();
        assert_eq!(buffers, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn pauses_go_through_the_clock() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();
        let script = vec![Directive::pause_ms(300), Directive::pause_ms(1000)];

        run_script(&mut board, &script, &mut clock).unwrap();

        assert_eq!(
            clock.sleeps,
            vec![Duration::from_millis(300), Duration::from_millis(1000)]
        );
        assert!(board.transport().requests().is_empty());
    }

    #[test]
    fn set_line_directive_targets_back_buffer() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();
        let script = vec![
            Directive::show(),
            Directive::line(2, vec![0xF0; 15]),
        ];

        run_script(&mut board, &script, &mut clock).unwrap();

        let requests = board.transport().requests();
        assert_eq!(requests[1].request, 1);
        assert_eq!(&requests[1].payload[..2], &[0, 2]);
    }

    #[test]
    fn explicit_buffers_override_the_tracked_one() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();
        let script = vec![
            Directive::clear().on(1),
            Directive::text(0, 0, "B").on(1),
            Directive::line(0, vec![0xFF]).on(1),
            Directive::scroll_left(1, 8).on(1),
            Directive::scroll_right(1, 8).on(1),
            Directive::show().on(1),
        ];

        run_script(&mut board, &script, &mut clock).unwrap();

        let buffers: Vec<u8> = decoded(&board).iter().map(|(_, b)| b.as_u8()).collect();
        assert_eq!(buffers, vec![1; 6]);
        // Showing buffer 1 makes buffer 0 the back buffer.
        assert_eq!(board.back_buffer(), BufferIndex::Zero);
    }

    #[test]
    fn on_leaves_pauses_alone() {
        assert_eq!(Directive::pause_ms(5).on(1), Directive::pause_ms(5));
        assert_eq!(Directive::show().on(7), Directive::Show { buffer: Some(7) });
    }

    #[test]
    fn invalid_explicit_buffer_stops_before_io() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();
        let script = vec![
            Directive::clear(),
            Directive::show().on(7),
            Directive::pause_ms(100),
        ];

        let result = run_script(&mut board, &script, &mut clock);

        assert_eq!(result, Err(BoardError::InvalidBuffer(7)));
        assert_eq!(board.transport().requests().len(), 1);
        assert!(clock.sleeps.is_empty());
    }

    #[test]
    fn failure_abandons_remaining_directives() {
        let mut board = Readerboard::new(FakeTransport::new().failing_at(1));
        let mut clock = FakeClock::default();
        let script = vec![
            Directive::clear(),
            Directive::text(0, 0, "LOST"),
            Directive::pause_ms(500),
            Directive::show(),
        ];

        let result = run_script(&mut board, &script, &mut clock);

        assert!(matches!(result, Err(BoardError::Transfer(_))));
        assert_eq!(board.transport().requests().len(), 1);
        assert!(clock.sleeps.is_empty());
        assert_eq!(board.back_buffer(), BufferIndex::Zero);
    }

    #[test]
    fn sequence_without_scores_ends_blank() {
        let script = message_sequence(None);

        assert_eq!(script[0], Directive::clear());
        assert_eq!(script[1], Directive::text(9, 0, "CHURCH OF ROBOTRON"));
        assert_eq!(
            script
                .iter()
                .filter(|d| **d == Directive::text(0, 0, "PREPARE FOR JUDGEMENT"))
                .count(),
            FLASH_COUNT
        );
        assert!(!script.iter().any(|d| matches!(d, Directive::ScrollRight { .. })));
        assert_eq!(script.last(), Some(&Directive::pause_ms(1000)));
    }

    #[test]
    fn sequence_with_top_score_announces_it() {
        let top = ScoreRecord {
            initials: "ZZZ".to_string(),
            score: 300,
        };
        let script = message_sequence(Some(&top));

        assert!(script.contains(&Directive::text(24, 0, "MUTANT SAVIOR")));
        assert!(script.contains(&Directive::text(32, 0, "300 ZZZ")));
        assert!(script.contains(&Directive::scroll_right(0, 120)));
    }

    #[test]
    fn full_sequence_runs_on_fake_board() {
        let mut board = Readerboard::new(FakeTransport::new());
        let mut clock = FakeClock::default();

        run_script(&mut board, &message_sequence(None), &mut clock).unwrap();

        let total: Duration = clock.sleeps.iter().sum();
        assert_eq!(total, Duration::from_millis(1000 + 3000 + 2000 + 5 * 600 + 1000));
    }
}
