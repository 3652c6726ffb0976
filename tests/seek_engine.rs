use oxidemux::{Frame, SeekEngine, SeekFlags, SeekPoint, SeekStep};
use quickcheck::{quickcheck, TestResult};
use rstest::rstest;

/// Variable-size frames, like an Ogg stream's pages
struct Vbr {
    /// (first sample, end sample, offset, size)
    frames: Vec<(u64, u64, u64, u64)>,
}

impl Vbr {
    fn new(count: u64) -> Self {
        let mut seed = 0x2545_f491u64;
        let mut frames = Vec::new();
        let (mut sample, mut offset) = (0, 0);
        for _ in 0..count {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let size = 200 + (seed >> 33) % 3000;
            let samples = 512 + (seed >> 45) % 4096;
            frames.push((sample, sample + samples, offset, size));
            sample += samples;
            offset += size;
        }
        Vbr { frames }
    }

    fn total(&self) -> SeekPoint {
        let &(_, end, offset, size) = self.frames.last().unwrap();
        SeekPoint::new(end, offset + size)
    }

    fn frame_at_or_after(&self, offset: u64, end_only: bool) -> Option<Frame> {
        self.frames.iter().find(|f| f.2 >= offset).map(|&(start, end, offset, size)| Frame {
            start: (!end_only).then_some(start),
            end,
            offset,
            size,
        })
    }

    fn resolve(&self, target: u64, flags: SeekFlags, end_only: bool) -> (u64, u32) {
        let mut engine = SeekEngine::new(target, SeekPoint::new(0, 0), self.total(), flags).unwrap();
        let mut step = engine.start(None).unwrap();
        loop {
            match step {
                SeekStep::Resolved(offset) => return (offset, engine.iterations()),
                SeekStep::Seek(offset) => {
                    step = match self.frame_at_or_after(offset, end_only) {
                        Some(frame) => engine.on_frame(frame).unwrap(),
                        None => engine.on_miss().unwrap(),
                    }
                }
            }
        }
    }

    fn covering(&self, target: u64) -> u64 {
        self.frames.iter().find(|f| f.0 <= target && target < f.1).map(|f| f.2).unwrap()
    }
}

#[rstest]
fn converges_on_the_covering_frame(
    #[values(false, true)] binary: bool,
    #[values(false, true)] end_only: bool,
    #[values(0, 1, 250_000, 511_999)] target: u64,
) {
    let vbr = Vbr::new(1000);
    let flags = SeekFlags { force_binary_search: binary };
    let (offset, iterations) = vbr.resolve(target, flags, end_only);
    assert_eq!(offset, vbr.covering(target));
    assert!(iterations <= 64, "took {iterations} iterations");
}

#[test]
fn out_of_range_target_is_unseekable() {
    let vbr = Vbr::new(10);
    let total = vbr.total();
    assert!(SeekEngine::new(total.sample, SeekPoint::new(0, 0), total, SeekFlags::default()).is_err());
}

quickcheck! {
    fn every_sample_resolves(target: u64, end_only: bool) -> TestResult {
        let vbr = Vbr::new(300);
        let target = target % vbr.total().sample;
        let (offset, _) = vbr.resolve(target, SeekFlags::default(), end_only);
        TestResult::from_bool(offset == vbr.covering(target))
    }
}
