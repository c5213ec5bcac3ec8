//! Parsing of ffmpeg `-progress` output.

/// Snapshot of one ffmpeg progress block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    pub frame: u64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }
}

/// Feed one `key=value` line into `current`.
///
/// Returns a snapshot each time a `progress=` line closes a block.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        // Both keys carry microseconds.
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_emitted_on_progress_key() {
        let mut current = FfmpegProgress::default();
        for line in ["frame=60", "out_time_us=2000000", "speed=1.5x"] {
            assert!(parse_progress_line(line, &mut current).is_none());
        }

        let block = parse_progress_line("progress=continue", &mut current).unwrap();
        assert_eq!(block.frame, 60);
        assert_eq!(block.out_time_secs(), 2.0);
        assert!(!block.is_complete);

        parse_progress_line("speed=N/A", &mut current);
        assert!((current.speed - 1.5).abs() < f64::EPSILON);

        assert!(parse_progress_line("progress=end", &mut current).unwrap().is_complete);
    }

    #[test]
    fn test_non_progress_lines_ignored() {
        let mut current = FfmpegProgress::default();
        assert!(parse_progress_line("Error opening input file", &mut current).is_none());
        assert_eq!(current, FfmpegProgress::default());
    }
}
