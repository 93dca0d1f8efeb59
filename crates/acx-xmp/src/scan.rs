//! Byte-level check for complete pose metadata.
//!
//! The check is a plain substring scan, so it sees packets in APP1 segments and
//! in trailers alike without parsing the container.

use std::path::Path;

/// Opening tags every analyzed image must carry.
pub const REQUIRED_TAGS: [&str; 31] = [
    "<Iptc4xmpExt:rbX>",
    "<Iptc4xmpExt:rbY>",
    "<Iptc4xmpExt:rbW>",
    "<Iptc4xmpExt:rbH>",
    "<acx:Pitch>",
    "<acx:Yaw>",
    "<acx:Roll>",
    "<acx:CenterX>",
    "<acx:CenterY>",
    "<acx:FaceWidth>",
    "<acx:Nose>",
    "<acx:EyeL>",
    "<acx:EyeR>",
    "<acx:EyeInnerL>",
    "<acx:EyeInnerR>",
    "<acx:MouthL>",
    "<acx:MouthR>",
    "<acx:Chin>",
    "<acx:OvalL>",
    "<acx:OvalR>",
    "<acx:Forehead>",
    "<acx:NoseEyeDist>",
    "<acx:FaceScale>",
    "<acx:FaceHeight>",
    "<acx:SrcScalePx>",
    "<acx:InterocularDist>",
    "<acx:InterocularInner>",
    "<acx:InterocularBlend>",
    "<acx:EyeMouthDist>",
    "<acx:OvalWidth>",
    "<acx:LandmarkConfidence>",
];

/// Single pass over `data`: every `<` is matched against the tags not yet seen.
pub fn has_required_pose_xmp(data: &[u8]) -> bool {
    let mut seen = [false; REQUIRED_TAGS.len()];
    let mut remaining = REQUIRED_TAGS.len();
    let mut rest = data;

    while let Some(pos) = rest.iter().position(|&b| b == b'<') {
        rest = &rest[pos..];
        // Tags all end in '>', so at most one can start here.
        if let Some((hit, _)) = seen
            .iter_mut()
            .zip(REQUIRED_TAGS)
            .find(|(hit, tag)| !**hit && rest.starts_with(tag.as_bytes()))
        {
            *hit = true;
            remaining -= 1;
            if remaining == 0 {
                return true;
            }
        }
        rest = &rest[1..];
    }
    false
}

/// Like [`has_required_pose_xmp`]; unreadable files count as missing.
pub fn file_has_required_pose_xmp(path: &Path) -> bool {
    match std::fs::read(path) {
        Ok(data) => has_required_pose_xmp(&data),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot read image for tag scan");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tags() -> String {
        REQUIRED_TAGS.iter().map(|t| format!("{t}0</x>")).collect()
    }

    #[test]
    fn test_all_tags_present() {
        let mut data = b"\xFF\xD8binary".to_vec();
        data.extend_from_slice(all_tags().as_bytes());
        assert!(has_required_pose_xmp(&data));
    }

    #[test]
    fn test_single_missing_tag() {
        let data = all_tags().replace("<acx:LandmarkConfidence>", "");
        assert!(!has_required_pose_xmp(data.as_bytes()));
        assert!(!has_required_pose_xmp(b""));
    }

    #[test]
    fn test_tags_in_any_order_among_binary() {
        let mut data = vec![b'<'; 64];
        for tag in REQUIRED_TAGS.iter().rev() {
            data.extend_from_slice(b"\x00<<");
            data.extend_from_slice(tag.as_bytes());
            data.extend_from_slice(tag.as_bytes());
        }
        assert!(has_required_pose_xmp(&data));

        // A tag cut short at the end of the buffer does not count.
        let text = all_tags().replace("<acx:Pitch>0</x>", "");
        let truncated = format!("{text}<acx:Pitch");
        assert!(!has_required_pose_xmp(truncated.as_bytes()));
    }

    #[test]
    fn test_file_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, all_tags()).unwrap();
        assert!(file_has_required_pose_xmp(&path));
        assert!(!file_has_required_pose_xmp(&dir.path().join("missing.png")));
    }
}
