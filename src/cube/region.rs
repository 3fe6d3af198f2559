//! DS9 region files and their pixel masks.
//!
//! Supported shapes are circle, ellipse, box and polygon in either a sky
//! frame (`fk5`, `icrs`, `j2000`, `fk4`, `wcs`) or an image frame (`image`,
//! `physical`). As in DS9, entries before any coordinate system line are
//! read as `physical`, which is the image frame here. Sizes accept `"`, `'`
//! and `d` suffixes, or `p`/`i` for pixels; bare sizes are degrees in sky
//! frames and pixels in image frames.
//!
//! Masks use pixel-centre containment: a pixel is in the region iff its centre
//! lies inside the shape. There is no partial-pixel weighting.

use std::ops::Range;
use std::path::Path;

use log::warn;
use ndarray::Array2;

use super::wcs::{CelestialWcs, tan_project};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Region model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Equatorial coordinates in degrees.
    Sky,
    /// 0-based pixel coordinates.
    Image,
}

/// A size as written in the file, resolved against the frame at rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Degrees(f64),
    Pixels(f64),
}

impl Length {
    /// Value in the units of `frame`, given the pixel size in degrees.
    fn in_frame(self, frame: Frame, pixel_deg: f64) -> f64 {
        match (self, frame) {
            (Length::Degrees(d), Frame::Sky) | (Length::Pixels(d), Frame::Image) => d,
            (Length::Pixels(p), Frame::Sky) => p * pixel_deg,
            (Length::Degrees(d), Frame::Image) => d / pixel_deg,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle {
        radius: Length,
    },
    Ellipse {
        semi_axes: (Length, Length),
        /// Degrees, counter-clockwise from the frame's x axis (West for sky).
        angle: f64,
    },
    Box {
        size: (Length, Length),
        angle: f64,
    },
    /// Absolute vertex positions in the region's frame.
    Polygon {
        vertices: Vec<(f64, f64)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// `text={...}` label, if any.
    pub name: Option<String>,
    pub frame: Frame,
    /// Shape centre; the first vertex for polygons.
    pub center: (f64, f64),
    pub shape: Shape,
}

/// Boolean aperture over one cube slice, indexed `(row, column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    pub inside: Array2<bool>,
}

impl RegionMask {
    pub fn count(&self) -> usize {
        self.inside.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse every region in a DS9 file. Zero regions is an error.
pub fn load_regions(path: &Path) -> Result<Vec<Region>> {
    let malformed = |reason: String| PipelineError::MalformedRegion {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    let regions = parse_regions(&text).map_err(malformed)?;
    if regions.is_empty() {
        return Err(malformed("file contains no regions".to_string()));
    }
    Ok(regions)
}

/// Only the first region of a file is used for extraction.
pub fn first_region(path: &Path) -> Result<Region> {
    let mut regions = load_regions(path)?;
    if regions.len() > 1 {
        warn!(
            "{} holds {} regions; only the first is used",
            path.display(),
            regions.len()
        );
    }
    Ok(regions.swap_remove(0))
}

/// Parse DS9 region text.
///
/// A bad entry is an error only while no region has been read yet. Once the
/// first region is in hand, later entries that cannot be used (annotations
/// such as `point` or `text`, unsupported frames) are skipped with a warning.
pub fn parse_regions(text: &str) -> std::result::Result<Vec<Region>, String> {
    // DS9 assumes `physical` until a coordinate system line says otherwise.
    let mut frame = Some(Frame::Image);
    let mut regions = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let (body, comment) = split_comment(line);
        for entry in body.split(';') {
            let entry = entry.trim();
            if entry.is_empty() || entry.starts_with("global") {
                continue;
            }
            let parsed = match parse_frame(entry) {
                Some(next) => {
                    frame = next.as_ref().ok().copied();
                    next.map(|_| None)
                }
                None => match frame {
                    Some(frame) => parse_shape(entry, frame, comment).map(Some),
                    None => Err("region in an unsupported coordinate system".to_string()),
                },
            };
            match parsed {
                Ok(Some(region)) => regions.push(region),
                Ok(None) => {}
                Err(e) if regions.is_empty() => return Err(format!("line {}: {e}", line_no + 1)),
                Err(e) => warn!("skipping region entry on line {}: {e}", line_no + 1),
            }
        }
    }
    Ok(regions)
}

/// `Some` for a coordinate system line: the frame, or why it is unusable.
fn parse_frame(entry: &str) -> Option<std::result::Result<Frame, String>> {
    let lower = entry.to_ascii_lowercase();
    match lower.as_str() {
        "fk5" | "fk4" | "icrs" | "j2000" | "b1950" | "wcs" => Some(Ok(Frame::Sky)),
        "image" | "physical" => Some(Ok(Frame::Image)),
        "galactic" | "ecliptic" | "linear" | "amplifier" | "detector" => {
            Some(Err(format!("unsupported coordinate system '{lower}'")))
        }
        _ => None,
    }
}

/// Split `shape(...) # text={name}` into body and comment; a line starting
/// with `#` is all comment.
fn split_comment(line: &str) -> (&str, &str) {
    match line.find('#') {
        Some(pos) => (&line[..pos], &line[pos + 1..]),
        None => (line, ""),
    }
}

fn text_label(comment: &str) -> Option<String> {
    let start = comment.find("text={")? + "text={".len();
    let len = comment[start..].find('}')?;
    Some(comment[start..start + len].to_string())
}

fn parse_shape(entry: &str, frame: Frame, comment: &str) -> std::result::Result<Region, String> {
    let entry = entry.strip_prefix('+').unwrap_or(entry);
    if entry.starts_with('-') {
        return Err("exclusion regions are not supported".to_string());
    }
    let open = entry.find('(').ok_or_else(|| format!("expected '(' in '{entry}'"))?;
    let close = entry.rfind(')').ok_or_else(|| format!("expected ')' in '{entry}'"))?;
    if close < open {
        return Err(format!("unbalanced parentheses in '{entry}'"));
    }
    let name = entry[..open].trim().to_ascii_lowercase();
    let args: Vec<&str> = entry[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();

    let arity = |min: usize, max: usize| {
        if args.len() < min || args.len() > max {
            Err(format!("{name} takes {min}..={max} arguments, got {}", args.len()))
        } else {
            Ok(())
        }
    };
    let angle = |idx: usize| -> std::result::Result<f64, String> {
        args.get(idx).map_or(Ok(0.0), |a| parse_number(a))
    };

    let (center, shape) = match name.as_str() {
        "circle" => {
            arity(3, 3)?;
            let center = parse_position(args[0], args[1], frame)?;
            let radius = parse_length(args[2], frame)?;
            (center, Shape::Circle { radius })
        }
        "ellipse" => {
            arity(4, 5)?;
            let center = parse_position(args[0], args[1], frame)?;
            let semi_axes = (parse_length(args[2], frame)?, parse_length(args[3], frame)?);
            (center, Shape::Ellipse { semi_axes, angle: angle(4)? })
        }
        "box" => {
            arity(4, 5)?;
            let center = parse_position(args[0], args[1], frame)?;
            let size = (parse_length(args[2], frame)?, parse_length(args[3], frame)?);
            (center, Shape::Box { size, angle: angle(4)? })
        }
        "polygon" => {
            if args.len() < 6 || args.len() % 2 != 0 {
                return Err(format!(
                    "polygon needs an even number (>= 6) of coordinates, got {}",
                    args.len()
                ));
            }
            let vertices = args
                .chunks_exact(2)
                .map(|pair| parse_position(pair[0], pair[1], frame))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (vertices[0], Shape::Polygon { vertices })
        }
        other => return Err(format!("unsupported region shape '{other}'")),
    };

    Ok(Region {
        name: text_label(comment),
        frame,
        center,
        shape,
    })
}

fn parse_number(s: &str) -> std::result::Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| format!("'{s}' is not a number"))
}

/// Centre coordinates: degrees (optionally `d`-suffixed) or sexagesimal for
/// sky frames, 1-based pixels for image frames.
fn parse_position(a: &str, b: &str, frame: Frame) -> std::result::Result<(f64, f64), String> {
    match frame {
        Frame::Image => Ok((parse_number(a)? - 1.0, parse_number(b)? - 1.0)),
        Frame::Sky => {
            let ra = if a.contains(':') {
                parse_sexagesimal(a)? * 15.0
            } else {
                parse_number(a.trim_end_matches('d'))?
            };
            let dec = if b.contains(':') {
                parse_sexagesimal(b)?
            } else {
                parse_number(b.trim_end_matches('d'))?
            };
            Ok((ra, dec))
        }
    }
}

/// `[+-]dd:mm:ss.s` → decimal units of the leading field.
fn parse_sexagesimal(s: &str) -> std::result::Result<f64, String> {
    let s = s.trim();
    let negative = s.starts_with('-');
    let mut value = 0.0;
    let mut divisor = 1.0;
    for part in s.trim_start_matches(['+', '-']).split(':') {
        value += parse_number(part)?.abs() / divisor;
        divisor *= 60.0;
    }
    Ok(if negative { -value } else { value })
}

fn parse_length(s: &str, frame: Frame) -> std::result::Result<Length, String> {
    let s = s.trim();
    if let Some(v) = s.strip_suffix('"') {
        Ok(Length::Degrees(parse_number(v)? / 3600.0))
    } else if let Some(v) = s.strip_suffix('\'') {
        Ok(Length::Degrees(parse_number(v)? / 60.0))
    } else if let Some(v) = s.strip_suffix('d') {
        Ok(Length::Degrees(parse_number(v)?))
    } else if let Some(v) = s.strip_suffix('p').or_else(|| s.strip_suffix('i')) {
        Ok(Length::Pixels(parse_number(v)?))
    } else {
        let v = parse_number(s)?;
        Ok(match frame {
            Frame::Sky => Length::Degrees(v),
            Frame::Image => Length::Pixels(v),
        })
    }
}

// ---------------------------------------------------------------------------
// Rasterization
// ---------------------------------------------------------------------------

/// Shape with lengths and vertices resolved into the local frame around the
/// region centre.
enum Footprint {
    Circle(f64),
    Ellipse { a: f64, b: f64, cos: f64, sin: f64 },
    Box { half_w: f64, half_h: f64, cos: f64, sin: f64 },
    Polygon(Vec<(f64, f64)>),
}

impl Footprint {
    fn contains(&self, (x, y): (f64, f64)) -> bool {
        match *self {
            Footprint::Circle(r) => x * x + y * y <= r * r,
            Footprint::Ellipse { a, b, cos, sin } => {
                let (u, v) = (x * cos + y * sin, -x * sin + y * cos);
                (u / a).powi(2) + (v / b).powi(2) <= 1.0
            }
            Footprint::Box { half_w, half_h, cos, sin } => {
                let (u, v) = (x * cos + y * sin, -x * sin + y * cos);
                u.abs() <= half_w && v.abs() <= half_h
            }
            Footprint::Polygon(ref vertices) => point_in_polygon((x, y), vertices),
        }
    }

    /// Distance from the local origin that encloses the whole shape.
    fn extent(&self) -> f64 {
        match *self {
            Footprint::Circle(r) => r,
            Footprint::Ellipse { a, b, .. } => a.max(b),
            Footprint::Box { half_w, half_h, .. } => half_w.hypot(half_h),
            Footprint::Polygon(ref vertices) => vertices
                .iter()
                .map(|&(x, y)| x.hypot(y))
                .fold(0.0, f64::max),
        }
    }
}

/// Even-odd rule ray casting.
fn point_in_polygon((x, y): (f64, f64), vertices: &[(f64, f64)]) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl Region {
    /// Position of a 0-based pixel centre relative to the region centre, in
    /// frame units: pixels for image regions, degrees (West, North) for sky.
    fn local(&self, wcs: &CelestialWcs, x: f64, y: f64) -> Option<(f64, f64)> {
        match self.frame {
            Frame::Image => Some((x - self.center.0, y - self.center.1)),
            Frame::Sky => {
                let (ra, dec) = wcs.pixel_to_sky(x, y);
                self.sky_offset(ra, dec)
            }
        }
    }

    fn sky_offset(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (xi, eta) = tan_project(
            ra.to_radians(),
            dec.to_radians(),
            self.center.0.to_radians(),
            self.center.1.to_radians(),
        )?;
        Some((-xi.to_degrees(), eta.to_degrees()))
    }

    fn footprint(&self, wcs: &CelestialWcs) -> Footprint {
        let pixel_deg = wcs.pixel_scale_deg();
        let len = |l: Length| l.in_frame(self.frame, pixel_deg);
        match &self.shape {
            Shape::Circle { radius } => Footprint::Circle(len(*radius)),
            Shape::Ellipse { semi_axes, angle } => {
                let (sin, cos) = angle.to_radians().sin_cos();
                Footprint::Ellipse {
                    a: len(semi_axes.0),
                    b: len(semi_axes.1),
                    cos,
                    sin,
                }
            }
            Shape::Box { size, angle } => {
                let (sin, cos) = angle.to_radians().sin_cos();
                Footprint::Box {
                    half_w: len(size.0) / 2.0,
                    half_h: len(size.1) / 2.0,
                    cos,
                    sin,
                }
            }
            Shape::Polygon { vertices } => Footprint::Polygon(
                vertices
                    .iter()
                    .filter_map(|&(vx, vy)| match self.frame {
                        Frame::Image => Some((vx - self.center.0, vy - self.center.1)),
                        Frame::Sky => self.sky_offset(vx, vy),
                    })
                    .collect(),
            ),
        }
    }

    /// Rows and columns that can hold pixels of the shape. `None` when the
    /// centre does not project onto the cube's tangent plane.
    fn pixel_window(
        &self,
        wcs: &CelestialWcs,
        footprint: &Footprint,
        (ny, nx): (usize, usize),
    ) -> Option<(Range<usize>, Range<usize>)> {
        let ((cx, cy), reach) = match self.frame {
            Frame::Image => (self.center, footprint.extent()),
            Frame::Sky => {
                let centre = wcs.sky_to_pixel(self.center.0, self.center.1)?;
                // Shortest pixel side, so the reach is never underestimated.
                let step = wcs.cd[0][0]
                    .hypot(wcs.cd[1][0])
                    .min(wcs.cd[0][1].hypot(wcs.cd[1][1]));
                (centre, footprint.extent() / step * 1.1)
            }
        };
        let span = |c: f64, n: usize| {
            let lo = (c - reach - 1.0).floor().clamp(0.0, n as f64) as usize;
            let hi = (c + reach + 2.0).ceil().clamp(0.0, n as f64) as usize;
            lo..hi.max(lo)
        };
        Some((span(cy, ny), span(cx, nx)))
    }

    /// Rasterize onto a `(rows, columns)` grid with pixel-centre containment.
    pub fn to_mask(&self, wcs: &CelestialWcs, (ny, nx): (usize, usize)) -> RegionMask {
        let footprint = self.footprint(wcs);
        let window = self.pixel_window(wcs, &footprint, (ny, nx));
        let inside = Array2::from_shape_fn((ny, nx), |(row, col)| {
            window
                .as_ref()
                .is_some_and(|(rows, cols)| rows.contains(&row) && cols.contains(&col))
                && self
                    .local(wcs, col as f64, row as f64)
                    .is_some_and(|p| footprint.contains(p))
        });
        RegionMask { inside }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const PIX: f64 = 0.13 / 3600.0;

    fn wcs() -> CelestialWcs {
        CelestialWcs::new([11.0, 11.0], [150.0, 2.2], [[-PIX, 0.0], [0.0, PIX]]).unwrap()
    }

    #[test]
    fn test_parse_ds9_header_and_shapes() {
        let text = "# Region file format: DS9 version 4.1\n\
            global color=green dashlist=8 3 width=1 font=\"helvetica 10 normal roman\"\n\
            fk5\n\
            circle(150.0,2.2,0.5\") # text={nucleus}\n\
            ellipse(10:00:00.0,+02:12:00.0,1\",0.5\",30)\n\
            image; box(5,5,4,2,0)\n\
            polygon(1,1,4,1,4,4)\n";
        let regions = parse_regions(text).unwrap();
        assert_eq!(regions.len(), 4);

        assert_eq!(regions[0].name.as_deref(), Some("nucleus"));
        assert_eq!(regions[0].frame, Frame::Sky);
        match regions[0].shape {
            Shape::Circle { radius: Length::Degrees(r) } => assert_abs_diff_eq!(r, 0.5 / 3600.0),
            ref other => panic!("unexpected shape {other:?}"),
        }

        assert_abs_diff_eq!(regions[1].center.0, 150.0, epsilon = 1e-12);
        assert_abs_diff_eq!(regions[1].center.1, 2.2, epsilon = 1e-12);

        assert_eq!(regions[2].frame, Frame::Image);
        assert_eq!(regions[2].center, (4.0, 4.0));
        assert_eq!(regions[3].frame, Frame::Image);
    }

    #[test]
    fn test_negative_sexagesimal_dec() {
        assert_abs_diff_eq!(parse_sexagesimal("-00:30:00").unwrap(), -0.5);
        assert_abs_diff_eq!(parse_sexagesimal("+12:15:36").unwrap(), 12.26);
    }

    #[test]
    fn test_unsupported_inputs() {
        assert!(parse_regions("galactic; circle(1,1,1)").is_err());
        assert!(parse_regions("fk5; point(150,2.2)").is_err());
        assert!(parse_regions("image; -circle(3,3,1)").is_err());
        assert!(parse_regions("image; polygon(1,1,2,2)").is_err());
        assert!(parse_regions("# only a comment\nglobal color=red\n").unwrap().is_empty());
    }

    #[test]
    fn test_load_regions_empty_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.reg");
        std::fs::write(&path, "# Region file format: DS9 version 4.1\nfk5\n").unwrap();
        assert!(matches!(
            load_regions(&path),
            Err(PipelineError::MalformedRegion { .. })
        ));
        assert!(matches!(
            first_region(&dir.path().join("missing.reg")),
            Err(PipelineError::MalformedRegion { .. })
        ));
    }

    #[test]
    fn test_first_region_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.reg");
        std::fs::write(&path, "image\ncircle(3,3,1) # text={a}\ncircle(8,8,1) # text={b}\n")
            .unwrap();
        assert_eq!(first_region(&path).unwrap().name.as_deref(), Some("a"));
    }

    #[test]
    fn test_annotations_after_first_region_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.reg");
        std::fs::write(
            &path,
            "image\ncircle(3,3,1) # text={core}\npoint(5,5)\n\
             fk5\ntext(150.0,2.2) text={label}\ngalactic\ncircle(1,1,1)\n",
        )
        .unwrap();
        let region = first_region(&path).unwrap();
        assert_eq!(region.name.as_deref(), Some("core"));
        assert_eq!(load_regions(&path).unwrap().len(), 1);

        // A bad entry ahead of every usable region still fails.
        std::fs::write(&path, "image\npoint(5,5)\ncircle(3,3,1)\n").unwrap();
        assert!(matches!(
            first_region(&path),
            Err(PipelineError::MalformedRegion { .. })
        ));
    }

    #[test]
    fn test_default_frame_is_physical() {
        let region = &parse_regions("circle(3,3,1)").unwrap()[0];
        assert_eq!(region.frame, Frame::Image);
        assert_eq!(region.center, (2.0, 2.0));
    }

    #[test]
    fn test_window_covers_rotated_sky_shapes() {
        // Non-square pixels and an off-centre, rotated shape.
        let wcs = CelestialWcs::new(
            [11.0, 11.0],
            [150.0, 2.2],
            [[-PIX, 0.0], [0.0, 0.5 * PIX]],
        )
        .unwrap();
        for text in [
            "fk5; box(150.00005,2.20003,1.0\",0.3\",30)",
            "fk5; ellipse(149.99995,2.19998,0.8\",0.2\",-60)",
        ] {
            let region = &parse_regions(text).unwrap()[0];
            let footprint = region.footprint(&wcs);
            let mut expected = 0;
            for row in 0..21 {
                for col in 0..21 {
                    if region
                        .local(&wcs, col as f64, row as f64)
                        .is_some_and(|p| footprint.contains(p))
                    {
                        expected += 1;
                    }
                }
            }
            let mask = region.to_mask(&wcs, (21, 21));
            assert!(expected > 0);
            assert_eq!(mask.count(), expected, "{text}");
        }
    }

    #[test]
    fn test_image_circle_uses_pixel_centres() {
        // Centre at 0-based (5, 5), radius exactly 1: the centre and its four
        // neighbours lie inside, diagonal neighbours (distance √2) do not.
        let region = &parse_regions("image; circle(6,6,1)").unwrap()[0];
        let mask = region.to_mask(&wcs(), (11, 11));
        assert_eq!(mask.count(), 5);
        assert!(mask.inside[[5, 5]]);
        assert!(mask.inside[[4, 5]] && mask.inside[[6, 5]]);
        assert!(mask.inside[[5, 4]] && mask.inside[[5, 6]]);
        assert!(!mask.inside[[4, 4]]);
    }

    #[test]
    fn test_sky_circle_matches_image_circle() {
        // Just over two pixels of radius around the reference pixel, in arcsec.
        let sky = &parse_regions("fk5; circle(150.0,2.2,0.27\")").unwrap()[0];
        let image = &parse_regions("image; circle(11,11,2)").unwrap()[0];
        let sky_mask = sky.to_mask(&wcs(), (21, 21));
        let image_mask = image.to_mask(&wcs(), (21, 21));
        assert_eq!(sky_mask, image_mask);
        assert_eq!(sky_mask.count(), 13);
    }

    #[test]
    fn test_rotated_box() {
        let flat = &parse_regions("image; box(6,6,5,1,0)").unwrap()[0];
        let upright = &parse_regions("image; box(6,6,5,1,90)").unwrap()[0];
        let flat_mask = flat.to_mask(&wcs(), (11, 11));
        let upright_mask = upright.to_mask(&wcs(), (11, 11));
        assert_eq!(flat_mask.count(), 5);
        assert_eq!(upright_mask.count(), 5);
        assert!(flat_mask.inside[[5, 7]]);
        assert!(upright_mask.inside[[7, 5]]);
        assert!(!upright_mask.inside[[5, 7]]);
    }

    #[test]
    fn test_polygon_mask() {
        // Square covering 0-based pixels 1..=3 in both axes.
        let region = &parse_regions("image; polygon(1.5,1.5,4.5,1.5,4.5,4.5,1.5,4.5)").unwrap()[0];
        let mask = region.to_mask(&wcs(), (6, 6));
        assert_eq!(mask.count(), 9);
        assert!(mask.inside[[2, 2]]);
        assert!(!mask.inside[[0, 0]]);
    }

    #[test]
    fn test_region_off_the_cube_is_empty() {
        let region = &parse_regions("image; circle(100,100,2)").unwrap()[0];
        assert!(region.to_mask(&wcs(), (11, 11)).is_empty());
    }
}
