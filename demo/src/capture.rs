//! Recording outbound frames for `mpnet-tools inspect`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::warn;
use transport::{Link, TransportResult};
use wire::{encode_frame, Limits};

/// Shared capture file. Frames from every connection are appended in send
/// order.
#[derive(Clone)]
pub struct Capture {
    out: Arc<Mutex<BufWriter<File>>>,
    limits: Limits,
}

impl Capture {
    pub fn create(path: &Path, limits: Limits) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: Arc::new(Mutex::new(BufWriter::new(file))),
            limits,
        })
    }

    fn record(&self, payload: &[u8]) {
        let Ok(frame) = encode_frame(payload, &self.limits) else {
            return;
        };
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(err) = out.write_all(&frame) {
            warn!("capture write failed: {err}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut out) = self.out.lock() {
            if let Err(err) = out.flush() {
                warn!("capture flush failed: {err}");
            }
        }
    }

    /// Wraps `link` so every frame it sends is recorded.
    pub fn wrap(&self, link: Box<dyn Link>) -> Box<dyn Link> {
        Box::new(CaptureLink {
            inner: link,
            capture: self.clone(),
        })
    }
}

struct CaptureLink {
    inner: Box<dyn Link>,
    capture: Capture,
}

impl Link for CaptureLink {
    fn send(&self, payload: &[u8]) -> TransportResult<()> {
        self.inner.send(payload)?;
        self.capture.record(payload);
        Ok(())
    }

    fn try_receive(&self) -> TransportResult<Option<Vec<u8>>> {
        self.inner.try_receive()
    }

    fn receive(&self) -> TransportResult<Vec<u8>> {
        self.inner.receive()
    }

    fn close(&self) {
        self.inner.close();
        self.capture.flush();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn peer(&self) -> &str {
        self.inner.peer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::MemoryLink;
    use wire::FrameDecoder;

    #[test]
    fn sent_frames_land_in_file() {
        let path = std::env::temp_dir().join(format!("mpnet-capture-{}.bin", std::process::id()));
        let capture = Capture::create(&path, Limits::for_testing()).unwrap();
        let (a, b) = MemoryLink::pair(Limits::for_testing());
        let a = capture.wrap(Box::new(a));

        a.send(&[1, 2, 3]).unwrap();
        a.send(&[4]).unwrap();
        assert_eq!(b.try_receive().unwrap(), Some(vec![1, 2, 3]));
        a.close();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let mut decoder = FrameDecoder::new(Limits::for_testing());
        decoder.push(&bytes);
        assert_eq!(decoder.next_frame().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(decoder.next_frame().unwrap(), Some(vec![4]));
        assert_eq!(decoder.next_frame().unwrap(), None);
    }

    #[test]
    fn failed_send_is_not_recorded() {
        let path =
            std::env::temp_dir().join(format!("mpnet-capture-fail-{}.bin", std::process::id()));
        let capture = Capture::create(&path, Limits::for_testing()).unwrap();
        let (a, _b) = MemoryLink::pair(Limits::for_testing());
        let a = capture.wrap(Box::new(a));

        a.close();
        assert!(a.send(&[9]).is_err());
        capture.flush();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(bytes.is_empty());
    }
}
