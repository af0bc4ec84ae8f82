// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! A CPU backend.

Keeps a copy of the atlas and the decoded vertices, and "draws" a frame by
computing every vertex position at the frame's interpolation scalar.  Results
are published through a [SoftwareProbe] that can be read from any thread.
*/

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Backend, BackendFactory, Error};
use crate::atlas::AtlasPatch;
use crate::geometry::{Endian, Vertex, decode_vertices};
use crate::pixel_formats::{RGBA8UNorm, Unorm4, write_png};

/// Everything the software backend has drawn so far.
#[derive(Debug, Clone, Default)]
pub struct SoftwareFrame {
    pub atlas_size: u32,
    /// `atlas_size * atlas_size` RGBA pixels.
    pub atlas: Vec<u8>,
    pub target: (u32, u32),
    pub vertices: Vec<Vertex>,
    /// Vertex positions in the last frame.
    pub positions: Vec<(f32, f32)>,
    pub interpolation: f32,
    pub frames: u64,
    pub patches_written: u64,
    pub geometry_loads: u64,
}

/// Shared view of a [SoftwareBackend].
#[derive(Debug, Clone, Default)]
pub struct SoftwareProbe(Arc<Mutex<SoftwareFrame>>);

impl SoftwareProbe {
    fn lock(&self) -> MutexGuard<'_, SoftwareFrame> {
        //a panic while holding the lock leaves plain data behind; keep going
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SoftwareFrame {
        self.lock().clone()
    }

    pub fn frames(&self) -> u64 {
        self.lock().frames
    }

    pub fn atlas_pixel(&self, x: u32, y: u32) -> Option<Unorm4> {
        let frame = self.lock();
        if x >= frame.atlas_size || y >= frame.atlas_size {
            return None;
        }
        let i = (y as usize * frame.atlas_size as usize + x as usize) * 4;
        let bytes = frame.atlas.get(i..i + 4)?;
        Some(Unorm4::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_atlas_png<W: std::io::Write>(&self, out: W) -> Result<(), Error> {
        let frame = self.lock();
        write_png::<RGBA8UNorm, _>(out, frame.atlas_size, frame.atlas_size, &frame.atlas)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SoftwareBackend {
    probe: SoftwareProbe,
    dump_atlas: Option<PathBuf>,
    atlas_dirty: bool,
}

impl SoftwareBackend {
    pub fn new(probe: SoftwareProbe, target: (u32, u32), atlas_size: u32, dump_atlas: Option<PathBuf>) -> Self {
        {
            let mut frame = probe.lock();
            *frame = SoftwareFrame {
                atlas_size,
                atlas: vec![0; atlas_size as usize * atlas_size as usize * 4],
                target,
                ..SoftwareFrame::default()
            };
        }
        SoftwareBackend {
            probe,
            dump_atlas,
            atlas_dirty: false,
        }
    }

    fn dump(&self, path: &std::path::Path) -> Result<(), Error> {
        let file = std::fs::File::create(path)?;
        self.probe.write_atlas_png(std::io::BufWriter::new(file))?;
        logwise::info_sync!(
            "Dumped atlas to {path}",
            path = logwise::privacy::LogIt(&path.display().to_string())
        );
        Ok(())
    }
}

/// A factory for [SoftwareBackend].  With `dump_atlas`, the atlas is written
/// to that path as PNG whenever patches were applied.
pub fn factory(probe: SoftwareProbe, dump_atlas: Option<PathBuf>) -> BackendFactory {
    Box::new(move |surface, atlas_size| {
        Ok(Box::new(SoftwareBackend::new(probe, surface.size(), atlas_size, dump_atlas)) as Box<dyn Backend>)
    })
}

impl Backend for SoftwareBackend {
    fn write_atlas(&mut self, patch: &AtlasPatch) -> Result<(), Error> {
        let mut frame = self.probe.lock();
        let size = frame.atlas_size as usize;
        let row = patch.width as usize * 4;
        for y in 0..patch.height as usize {
            let src = &patch.pixels[y * row..(y + 1) * row];
            let start = ((patch.y as usize + y) * size + patch.x as usize) * 4;
            frame.atlas[start..start + row].copy_from_slice(src);
        }
        frame.patches_written += 1;
        self.atlas_dirty = true;
        Ok(())
    }

    fn load_geometry(&mut self, bytes: &[u8], vertex_count: u32, endian: Endian) -> Result<(), Error> {
        let vertices = decode_vertices(bytes, vertex_count, endian)?;
        {
            let mut frame = self.probe.lock();
            frame.vertices = vertices;
            frame.geometry_loads += 1;
        }
        if self.atlas_dirty {
            self.atlas_dirty = false;
            if let Some(path) = &self.dump_atlas {
                self.dump(path)?;
            }
        }
        Ok(())
    }

    fn render(&mut self, interpolation: f32) -> Result<(), Error> {
        let mut frame = self.probe.lock();
        frame.positions = frame
            .vertices
            .iter()
            .map(|v| v.position_at(interpolation))
            .collect();
        frame.interpolation = interpolation;
        frame.frames += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        self.probe.lock().target = (width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VERTEX_SIZE;

    fn backend(probe: &SoftwareProbe) -> SoftwareBackend {
        SoftwareBackend::new(probe.clone(), (16, 16), 4, None)
    }

    #[test]
    fn patches_land_at_their_offset() {
        let probe = SoftwareProbe::default();
        let mut backend = backend(&probe);
        backend
            .write_atlas(&AtlasPatch {
                pixels: vec![9, 8, 7, 6],
                width: 1,
                height: 1,
                x: 3,
                y: 2,
            })
            .unwrap();
        assert_eq!(
            probe.atlas_pixel(3, 2),
            Some(Unorm4 {
                r: 9,
                g: 8,
                b: 7,
                a: 6
            })
        );
        assert_eq!(probe.atlas_pixel(2, 2), Some(Unorm4::default()));
        assert_eq!(probe.atlas_pixel(4, 0), None);
    }

    #[test]
    fn render_moves_vertices_by_delta() {
        let probe = SoftwareProbe::default();
        let mut backend = backend(&probe);
        let vertex = Vertex {
            x: -1.0,
            y: 1.0,
            dx: 0.25,
            dy: -0.5,
            u: 0,
            v: 0,
            color: Unorm4::WHITE,
        };
        let mut bytes = vec![0; VERTEX_SIZE];
        vertex.write(&mut bytes, Endian::Big);
        backend.load_geometry(&bytes, 1, Endian::Big).unwrap();
        backend.render(2.0).unwrap();
        let frame = probe.snapshot();
        assert_eq!(frame.positions, vec![(-0.5, 0.0)]);
        assert_eq!(frame.frames, 1);
        backend.resize(32, 8).unwrap();
        assert_eq!(probe.snapshot().target, (32, 8));
    }

    #[test]
    fn atlas_dump_is_png() {
        let probe = SoftwareProbe::default();
        let _backend = backend(&probe);
        let mut out = Vec::new();
        probe.write_atlas_png(&mut out).unwrap();
        assert_eq!(&out[1..4], b"PNG");
    }
}
