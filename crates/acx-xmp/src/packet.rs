//! XMP packet generation.
//!
//! The packet carries one IPTC image region (the padded landmark bounding box)
//! and the `acx:` pose fields. Each field is printed at the precision its value
//! was rounded to, which the gallery build step relies on when re-parsing.

use acx_core::{FaceMetrics, Landmark, Point};
use std::fmt::Write as _;

/// Namespace URI of the `acx:` pose fields.
pub const ACX_NAMESPACE: &str = "http://alt-context.dev/ns/1.0/";

/// Fraction of the landmark box added on each side of the display region.
const REGION_PADDING: f64 = 0.25;

/// Display region in relative image units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Landmark bounding box padded by 25% per side and clamped to the image.
pub fn display_region(landmarks: &[Landmark]) -> Region {
    if landmarks.is_empty() {
        return Region {
            x: 0.0,
            y: 0.0,
            w: 0.0,
            h: 0.0,
        };
    }

    let (min_x, max_x, min_y, max_y) = landmarks.iter().fold(
        (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ),
        |(lx, hx, ly, hy), lm| (lx.min(lm.x), hx.max(lm.x), ly.min(lm.y), hy.max(lm.y)),
    );
    let raw_w = max_x - min_x;
    let raw_h = max_y - min_y;
    let pad_w = raw_w * REGION_PADDING;
    let pad_h = raw_h * REGION_PADDING;

    let x = (min_x - pad_w).max(0.0);
    let y = (min_y - pad_h).max(0.0);
    Region {
        x,
        y,
        w: (1.0 - x).min(raw_w + 2.0 * pad_w),
        h: (1.0 - y).min(raw_h + 2.0 * pad_h),
    }
}

/// Person name derived from an image stem: `jane_doe_2` → `Jane`.
pub fn display_name(stem: &str) -> String {
    let first = stem.split('_').next().unwrap_or_default();
    let mut chars = first.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => "Unknown".to_string(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn pair(p: Point) -> String {
    format!("{:.4},{:.4}", p.x, p.y)
}

/// Render the XMP packet for one face.
pub fn generate_xmp(metrics: &FaceMetrics, name: &str, landmarks: &[Landmark]) -> String {
    let region = display_region(landmarks);
    let m = metrics;

    let fields: [(&str, String); 28] = [
        ("Pitch", format!("{:.2}", m.pitch)),
        ("Yaw", format!("{:.2}", m.yaw)),
        ("Roll", format!("{:.2}", m.roll)),
        ("CenterX", format!("{:.4}", m.center.x)),
        ("CenterY", format!("{:.4}", m.center.y)),
        ("FaceWidth", format!("{:.4}", m.face_width)),
        ("FaceScale", format!("{:.6}", m.face_scale)),
        ("InterocularDist", format!("{:.6}", m.interocular_dist)),
        ("InterocularInner", format!("{:.6}", m.iodist_inner)),
        ("InterocularBlend", format!("{:.6}", m.iodist_blend)),
        ("EyeMouthDist", format!("{:.6}", m.eye_mouth_dist)),
        ("OvalWidth", format!("{:.6}", m.oval_width)),
        ("Nose", pair(m.nose)),
        ("EyeL", pair(m.eye_l)),
        ("EyeR", pair(m.eye_r)),
        ("EyeInnerL", pair(m.eye_li)),
        ("EyeInnerR", pair(m.eye_ri)),
        ("MouthL", pair(m.mouth_l)),
        ("MouthR", pair(m.mouth_r)),
        ("Chin", pair(m.chin)),
        ("OvalL", pair(m.oval_l)),
        ("OvalR", pair(m.oval_r)),
        ("Forehead", pair(m.forehead)),
        ("FaceHeight", format!("{:.6}", m.face_height)),
        ("SrcScalePx", format!("{:.6}", m.src_scale_px)),
        ("NoseEyeDist", format!("{:.6}", m.nose_eye_dist)),
        ("LandmarkConfidence", format!("{:.3}", m.landmark_confidence)),
        ("DetScore", format!("{:.3}", m.score)),
    ];

    let mut acx = String::new();
    for (tag, value) in &fields {
        // Writing into a String cannot fail.
        let _ = writeln!(acx, "            <acx:{tag}>{value}</acx:{tag}>");
    }

    format!(
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description
      xmlns:Iptc4xmpExt="http://iptc.org/std/Iptc4xmpExt/2008-02-29/"
      xmlns:acx="{ns}">
      <Iptc4xmpExt:ImageRegion>
        <rdf:Bag>
          <rdf:li>
            <Iptc4xmpExt:RegionBoundary>
              <Iptc4xmpExt:rbShape>rectangle</Iptc4xmpExt:rbShape>
              <Iptc4xmpExt:rbX>{x:.3}</Iptc4xmpExt:rbX>
              <Iptc4xmpExt:rbY>{y:.3}</Iptc4xmpExt:rbY>
              <Iptc4xmpExt:rbW>{w:.3}</Iptc4xmpExt:rbW>
              <Iptc4xmpExt:rbH>{h:.3}</Iptc4xmpExt:rbH>
              <Iptc4xmpExt:rbUnit>relative</Iptc4xmpExt:rbUnit>
            </Iptc4xmpExt:RegionBoundary>
            <Iptc4xmpExt:Name>{name}</Iptc4xmpExt:Name>
{acx}          </rdf:li>
        </rdf:Bag>
      </Iptc4xmpExt:ImageRegion>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>"#,
        ns = ACX_NAMESPACE,
        x = region.x,
        y = region.y,
        w = region.w,
        h = region.h,
        name = escape(name),
        acx = acx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::has_required_pose_xmp;
    use acx_core::mesh::MESH_LANDMARKS;

    fn mesh() -> Vec<Landmark> {
        let mut mesh = vec![Landmark::new(0.5, 0.5, 0.0); MESH_LANDMARKS];
        mesh[0] = Landmark::new(0.3, 0.2, 0.0);
        mesh[1] = Landmark::new(0.7, 0.8, 0.0);
        mesh
    }

    #[test]
    fn test_display_region_pads_and_clamps() {
        let region = display_region(&mesh());
        // box 0.4 x 0.6, padding 0.1 / 0.15
        assert!((region.x - 0.2).abs() < 1e-9);
        assert!((region.y - 0.05).abs() < 1e-9);
        assert!((region.w - 0.6).abs() < 1e-9);
        assert!((region.h - 0.9).abs() < 1e-9);

        let wide = vec![Landmark::new(0.0, 0.1, 0.0), Landmark::new(1.0, 0.9, 0.0)];
        let region = display_region(&wide);
        assert_eq!(region.x, 0.0);
        assert!((region.w - 1.0).abs() < 1e-9);
        assert!((region.h - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("jane_doe_2"), "Jane");
        assert_eq!(display_name("ÉMILE"), "Émile");
        assert_eq!(display_name("_1"), "Unknown");
        assert_eq!(display_name("bob"), "Bob");
    }

    #[test]
    fn test_packet_fields_and_precision() {
        let landmarks = mesh();
        let metrics = acx_core::compute_face_metrics(&landmarks, None, 0.9).unwrap();
        let metrics = FaceMetrics {
            yaw: -12.5,
            ..metrics
        };
        let xmp = generate_xmp(&metrics, "Ann & Co", &landmarks);

        assert!(xmp.starts_with("<x:xmpmeta"));
        assert!(xmp.ends_with("</x:xmpmeta>"));
        assert!(xmp.contains("<acx:Yaw>-12.50</acx:Yaw>"));
        assert!(xmp.contains("<acx:Pitch>0.00</acx:Pitch>"));
        assert!(xmp.contains("<acx:DetScore>0.900</acx:DetScore>"));
        assert!(xmp.contains("<Iptc4xmpExt:rbX>0.200</Iptc4xmpExt:rbX>"));
        assert!(xmp.contains("<Iptc4xmpExt:Name>Ann &amp; Co</Iptc4xmpExt:Name>"));
        assert!(xmp.contains(&format!("xmlns:acx=\"{ACX_NAMESPACE}\"")));
        assert!(has_required_pose_xmp(xmp.as_bytes()));
    }
}
