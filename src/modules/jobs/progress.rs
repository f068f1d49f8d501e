use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// ffmpeg reserves the 25-75% band of overall job progress for the
/// transcode phase itself.
const TRANSCODE_BAND_START: u8 = 25;
const TRANSCODE_BAND_WIDTH: f64 = 50.0;

/// Parses an ffmpeg `hours:minutes:seconds.fraction` timestamp into
/// seconds. Returns None for anything that does not look like one.
fn parse_timestamp(s: &str) -> Option<f64> {
    let mut parts = s.splitn(3, ':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Extracts the total duration from a `Duration: 00:01:30.00, ...` line.
fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.split("Duration: ").nth(1)?;
    let timestamp = rest.split(',').next()?;
    parse_timestamp(timestamp)
}

/// Extracts the current position from a `... time=00:00:45.00 ...` line.
fn parse_time_line(line: &str) -> Option<f64> {
    let rest = line.split("time=").nth(1)?;
    let timestamp = rest.split_whitespace().next()?;
    parse_timestamp(timestamp)
}

/// Maps a position within the transcode to overall job progress,
/// clamping the fraction to [0, 1].
fn transcode_progress(elapsed: f64, duration: f64) -> u8 {
    let fraction = (elapsed / duration).clamp(0.0, 1.0);
    TRANSCODE_BAND_START + (fraction * TRANSCODE_BAND_WIDTH).round() as u8
}

/// Watches the transcoder's diagnostic stream and forwards a running
/// completion estimate over `updates`.
///
/// The stream must be drained while the subprocess runs or ffmpeg stalls
/// on a full pipe buffer, so this is spawned alongside the wait on the
/// child. It never fails: until a `Duration:` line shows up no progress
/// is reported at all, and malformed or unmatched lines are skipped. The
/// watcher ends when the stream closes; dropping the sender is how the
/// executor learns the stream is done.
pub async fn watch<R>(stream: R, updates: mpsc::Sender<u8>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();

    // Phase one: scan for the total duration of the run.
    let mut duration = None;
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("Duration: ") {
            duration = parse_duration_line(&line);
            break;
        }
    }

    let Some(duration) = duration else {
        // Drain the rest so the subprocess never blocks on stderr.
        while let Ok(Some(_)) = lines.next_line().await {}
        return;
    };
    if duration <= 0.0 {
        while let Ok(Some(_)) = lines.next_line().await {}
        return;
    }
    debug!(duration_seconds = duration, "transcode duration detected");

    // Phase two: every time= line becomes a progress update.
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.contains("time=") {
            continue;
        }
        if let Some(elapsed) = parse_time_line(&line) {
            if updates
                .send(transcode_progress(elapsed, duration))
                .await
                .is_err()
            {
                // Receiver gone, keep draining without reporting.
                while let Ok(Some(_)) = lines.next_line().await {}
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:30.00"), Some(30.0));
        assert_eq!(parse_timestamp("00:01:30.50"), Some(90.5));
        assert_eq!(parse_timestamp("01:00:00.00"), Some(3600.0));
        assert_eq!(parse_timestamp("garbage"), None);
        assert_eq!(parse_timestamp("00:30"), None);
    }

    #[test]
    fn test_parse_duration_line() {
        let line = "  Duration: 00:02:00.00, start: 0.000000, bitrate: 1205 kb/s";
        assert_eq!(parse_duration_line(line), Some(120.0));
        assert_eq!(parse_duration_line("frame= 100"), None);
    }

    #[test]
    fn test_parse_time_line() {
        let line = "frame=  480 fps= 48 q=28.0 size=    1024KiB time=00:00:20.00 bitrate= 419.4kbits/s speed=2.01x";
        assert_eq!(parse_time_line(line), Some(20.0));
        assert_eq!(parse_time_line("no marker here"), None);
    }

    #[test]
    fn test_transcode_progress_band() {
        assert_eq!(transcode_progress(0.0, 100.0), 25);
        assert_eq!(transcode_progress(50.0, 100.0), 50);
        assert_eq!(transcode_progress(100.0, 100.0), 75);
        // Position past the reported duration clamps at the band end.
        assert_eq!(transcode_progress(150.0, 100.0), 75);
    }

    #[tokio::test]
    async fn test_watch_reports_band_progress() {
        let stderr = b"Input #0, matroska\n  Duration: 00:01:40.00, start: 0.0\nframe=1 time=00:00:25.00 speed=1x\nframe=2 time=00:00:50.00 speed=1x\nframe=3 time=00:01:40.00 speed=1x\n";
        let (tx, mut rx) = mpsc::channel(16);

        watch(&stderr[..], tx).await;

        assert_eq!(rx.recv().await, Some(38)); // 25 + round(0.25 * 50)
        assert_eq!(rx.recv().await, Some(50));
        assert_eq!(rx.recv().await, Some(75));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_watch_without_duration_reports_nothing() {
        let stderr = b"some banner\nframe=1 time=00:00:25.00 speed=1x\n";
        let (tx, mut rx) = mpsc::channel(16);

        watch(&stderr[..], tx).await;

        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_watch_skips_malformed_lines() {
        let stderr =
            b"Duration: 00:00:10.00, start\ntime=not-a-timestamp\ntime=00:00:05.00 ok\n";
        let (tx, mut rx) = mpsc::channel(16);

        watch(&stderr[..], tx).await;

        assert_eq!(rx.recv().await, Some(50));
        assert_eq!(rx.recv().await, None);
    }
}
