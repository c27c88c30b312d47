use std::sync::Arc;

use crate::error::{Error, Result};

// Flat layout: [windowW, windowH, for each stage: stageThreshold, weakCount,
// for each weak: tilted, rectCount, rects (x y w h weight) * rectCount,
// nodeThreshold, leafLeft, leafRight]. Walked by cursor, no per-node objects.
#[derive(Debug, Clone)]
pub struct Cascade {
    data: Arc<[f64]>,
}

impl Cascade {
    pub fn from_flat(data: Vec<f64>) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::Load("cascade buffer shorter than the window-size header".into()));
        }
        let cascade = Cascade { data: data.into() };
        cascade.validate()?;
        Ok(cascade)
    }

    fn validate(&self) -> Result<()> {
        let mut cursor = 2usize;
        let len = self.data.len();
        while cursor < len {
            if cursor + 2 > len {
                return Err(Error::Load("truncated stage header".into()));
            }
            let weak_count = self.data[cursor + 1] as usize;
            cursor += 2;
            for _ in 0..weak_count {
                if cursor + 2 > len {
                    return Err(Error::Load("truncated weak classifier header".into()));
                }
                let rect_count = self.data[cursor + 1] as usize;
                cursor += 2 + rect_count * 5;
                if cursor + 3 > len {
                    return Err(Error::Load("truncated weak classifier leaves".into()));
                }
                cursor += 3;
            }
        }
        if cursor != len {
            return Err(Error::Load("cascade buffer length does not match its declared layout".into()));
        }
        Ok(())
    }

    pub fn window_width(&self) -> u32 {
        self.data[0] as u32
    }

    pub fn window_height(&self) -> u32 {
        self.data[1] as u32
    }

    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    pub fn stages(&self) -> StageIter<'_> {
        StageIter { data: &self.data, cursor: 2 }
    }

    pub fn stage_count(&self) -> usize {
        self.stages().count()
    }
}

pub struct StageIter<'a> {
    data: &'a [f64],
    cursor: usize,
}

impl<'a> Iterator for StageIter<'a> {
    type Item = Stage<'a>;

    fn next(&mut self) -> Option<Stage<'a>> {
        if self.cursor >= self.data.len() {
            return None;
        }
        let threshold = self.data[self.cursor];
        let weak_count = self.data[self.cursor + 1] as usize;
        let body_start = self.cursor + 2;

        let mut cursor = body_start;
        for _ in 0..weak_count {
            let rect_count = self.data[cursor + 1] as usize;
            cursor += 2 + rect_count * 5 + 3;
        }

        let stage = Stage { data: &self.data[body_start..cursor], threshold, weak_count };
        self.cursor = cursor;
        Some(stage)
    }
}

pub struct Stage<'a> {
    data: &'a [f64],
    pub threshold: f64,
    pub weak_count: usize,
}

impl<'a> Stage<'a> {
    pub fn weaks(&self) -> WeakIter<'a> {
        WeakIter { data: self.data, cursor: 0 }
    }
}

pub struct WeakIter<'a> {
    data: &'a [f64],
    cursor: usize,
}

impl<'a> Iterator for WeakIter<'a> {
    type Item = Weak<'a>;

    fn next(&mut self) -> Option<Weak<'a>> {
        if self.cursor >= self.data.len() {
            return None;
        }
        let tilted = self.data[self.cursor] != 0.0;
        let rect_count = self.data[self.cursor + 1] as usize;
        let rects_start = self.cursor + 2;
        let rects_end = rects_start + rect_count * 5;
        let node_threshold = self.data[rects_end];
        let leaf_left = self.data[rects_end + 1];
        let leaf_right = self.data[rects_end + 2];
        self.cursor = rects_end + 3;

        Some(Weak {
            tilted,
            rects: &self.data[rects_start..rects_end],
            node_threshold,
            leaf_left,
            leaf_right,
        })
    }
}

pub struct Weak<'a> {
    pub tilted: bool,
    rects: &'a [f64],
    pub node_threshold: f64,
    pub leaf_left: f64,
    pub leaf_right: f64,
}

impl<'a> Weak<'a> {
    pub fn rects(&self) -> impl Iterator<Item = WeakRect> + 'a {
        self.rects.chunks_exact(5).map(|c| WeakRect {
            x: c[0] as i32,
            y: c[1] as i32,
            width: c[2] as i32,
            height: c[3] as i32,
            weight: c[4],
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeakRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_cascade() -> Vec<f64> {
        vec![
            20.0, 20.0, // window
            0.5, 1.0, // stage: threshold, weakCount=1
            0.0, 1.0, // weak: tilted=0, rectCount=1
            0.0, 0.0, 10.0, 10.0, 1.0, // rect
            0.1, -1.0, 1.0, // nodeThreshold, leafLeft, leafRight
        ]
    }

    #[test]
    fn walks_a_single_stage_single_weak_cascade() {
        let cascade = Cascade::from_flat(tiny_cascade()).unwrap();
        assert_eq!(cascade.window_width(), 20);
        assert_eq!(cascade.window_height(), 20);
        assert_eq!(cascade.stage_count(), 1);

        let stage = cascade.stages().next().unwrap();
        assert_eq!(stage.threshold, 0.5);
        let weak = stage.weaks().next().unwrap();
        assert!(!weak.tilted);
        assert_eq!(weak.node_threshold, 0.1);
        let rect = weak.rects().next().unwrap();
        assert_eq!(rect.width, 10);
        assert_eq!(rect.weight, 1.0);
    }

    #[test]
    fn rejects_truncated_buffer() {
        let mut data = tiny_cascade();
        data.truncate(data.len() - 2);
        assert!(Cascade::from_flat(data).is_err());
    }
}
