//! Graphics command model.
//!
//! A frame on the wire is `ESC _ G <control>;<payload> ESC \` where the
//! control section is comma-separated `key=value` pairs with single-letter
//! keys. Parsing fills a flat [`Command`] record first; [`Command::kind`]
//! then classifies it into a per-action variant with its required fields
//! validated, so executor code never probes optional fields that cannot
//! apply to the action at hand.

/// Frame introducer: APC `G`.
pub const FRAME_START: &str = "\x1b_G";
/// String terminator.
pub const FRAME_END: &str = "\x1b\\";

/// Protocol action, from the `a=` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTag {
    /// `a=t` - transmit (store only).
    Transmit,
    /// `a=T` (or absent) - transmit and display.
    TransmitAndDisplay,
    /// `a=p` - place a previously transmitted image.
    Put,
    /// `a=d` - delete images or placements.
    Delete,
    /// `a=q` - capability query.
    Query,
    /// `a=f` - animation frame transmission (accepted, unimplemented).
    Frame,
    /// `a=a` - animation control (accepted, unimplemented).
    Animate,
    /// `a=c` - frame composition (accepted, unimplemented).
    Compose,
}

/// Pixel format, from the `f=` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// `f=24` - raw RGB, 3 bytes per pixel.
    Rgb,
    /// `f=32` - raw RGBA, 4 bytes per pixel.
    Rgba,
    /// `f=100` - PNG container; dimensions come from the image itself.
    Png,
    /// Any other value; decoding fails with a typed error.
    Unknown(u32),
}

/// Transmission medium, from the `t=` key. Only direct transmission is
/// serviceable in a browser host; the rest parse but are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    Direct,
    File,
    TempFile,
    SharedMemory,
}

/// Payload compression, from the `o=` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Zlib,
}

/// Source-crop rectangle carried by a placement. A zero width or height
/// means "full extent" in that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One decoded protocol command: every field the control section can carry.
///
/// Constructed by the parser from a single frame, consumed once by the
/// manager, never retained. Optional fields stay `None` when their key was
/// absent so downstream defaulting can distinguish "unset" from zero.
#[derive(Debug, Clone)]
pub struct Command {
    pub action: ActionTag,
    /// `i=` image ID (0 and absent both mean "unassigned").
    pub image_id: Option<u32>,
    /// `I=` image number (client-side correlation handle).
    pub image_number: Option<u32>,
    /// `p=` placement ID.
    pub placement_id: Option<u32>,
    /// `f=` pixel format; `None` when the key was absent.
    pub format: Option<PixelFormat>,
    /// `t=` transmission medium.
    pub transmission: Transmission,
    /// `o=` compression.
    pub compression: Compression,
    /// `m=1` - more chunks follow.
    pub more_chunks: bool,
    /// `s=` source width in pixels.
    pub width: Option<u32>,
    /// `v=` source height in pixels.
    pub height: Option<u32>,
    /// `c=` display width in cells.
    pub cols: Option<u32>,
    /// `r=` display height in cells.
    pub rows: Option<u32>,
    /// `X=` absolute cell column; cursor-relative when absent.
    pub abs_col: Option<u32>,
    /// `Y=` absolute cell row; cursor-relative when absent.
    pub abs_row: Option<i64>,
    /// `x=` horizontal pixel offset within the first cell.
    pub x_offset: u32,
    /// `y=` vertical pixel offset within the first cell.
    pub y_offset: u32,
    /// `w=`/`h=` source-crop size in pixels (origin fixed at 0,0 in this
    /// dialect; `x`/`y` are taken by the sub-cell offsets).
    pub crop_width: u32,
    pub crop_height: u32,
    /// `z=` z-index, signed: negative renders under text.
    pub z_index: i32,
    /// `C=1` - do not move the cursor after display.
    pub cursor_movement: u8,
    /// `q=` response verbosity: 0 = all, 1 = no OK, 2 = silent.
    pub quiet: u8,
    /// `d=` delete-target letter.
    pub delete_letter: Option<char>,
    /// Base64 payload text after the first `;`.
    pub payload: String,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            action: ActionTag::TransmitAndDisplay,
            image_id: None,
            image_number: None,
            placement_id: None,
            format: None,
            transmission: Transmission::Direct,
            compression: Compression::None,
            more_chunks: false,
            width: None,
            height: None,
            cols: None,
            rows: None,
            abs_col: None,
            abs_row: None,
            x_offset: 0,
            y_offset: 0,
            crop_width: 0,
            crop_height: 0,
            z_index: 0,
            cursor_movement: 0,
            quiet: 0,
            delete_letter: None,
            payload: String::new(),
        }
    }
}

impl Command {
    /// Parse a frame interior (everything between `ESC _ G` and `ESC \`).
    ///
    /// The interior splits on the first `;` into control section and
    /// payload. Malformed `key=value` pairs are dropped individually; the
    /// rest of the frame still parses (a mangled key must not cost the
    /// whole command).
    pub fn parse(interior: &str) -> Self {
        let mut cmd = Command::default();

        let (control, payload) = match interior.find(';') {
            Some(sep) => (&interior[..sep], &interior[sep + 1..]),
            None => (interior, ""),
        };
        cmd.payload = payload.to_string();

        for pair in control.split(',') {
            if pair.is_empty() {
                continue;
            }
            let Some(eq) = pair.find('=') else {
                log::trace!("dropping malformed control pair: {pair:?}");
                continue;
            };
            let (key, value) = (&pair[..eq], &pair[eq + 1..]);
            cmd.apply_pair(key, value);
        }

        cmd
    }

    fn apply_pair(&mut self, key: &str, value: &str) {
        match key {
            "a" => {
                self.action = match value {
                    "t" => ActionTag::Transmit,
                    "T" => ActionTag::TransmitAndDisplay,
                    "p" | "P" => ActionTag::Put,
                    "d" | "D" => ActionTag::Delete,
                    "q" | "Q" => ActionTag::Query,
                    "f" | "F" => ActionTag::Frame,
                    "a" | "A" => ActionTag::Animate,
                    "c" => ActionTag::Compose,
                    _ => ActionTag::TransmitAndDisplay,
                };
            }
            "i" => self.image_id = value.parse().ok(),
            "I" => self.image_number = value.parse().ok(),
            "p" => self.placement_id = value.parse().ok(),
            "f" => {
                self.format = value.parse::<u32>().ok().map(|n| match n {
                    24 => PixelFormat::Rgb,
                    32 => PixelFormat::Rgba,
                    100 => PixelFormat::Png,
                    other => PixelFormat::Unknown(other),
                });
            }
            "t" => {
                self.transmission = match value {
                    "d" | "D" => Transmission::Direct,
                    "f" | "F" => Transmission::File,
                    "t" | "T" => Transmission::TempFile,
                    "s" | "S" => Transmission::SharedMemory,
                    _ => Transmission::Direct,
                };
            }
            "o" => {
                if value == "z" {
                    self.compression = Compression::Zlib;
                }
            }
            "m" => self.more_chunks = value == "1",
            "s" => self.width = value.parse().ok(),
            "v" => self.height = value.parse().ok(),
            "c" => self.cols = value.parse().ok(),
            "r" => self.rows = value.parse().ok(),
            "X" => self.abs_col = value.parse().ok(),
            "Y" => self.abs_row = value.parse().ok(),
            "x" => self.x_offset = value.parse().unwrap_or(0),
            "y" => self.y_offset = value.parse().unwrap_or(0),
            "w" => self.crop_width = value.parse().unwrap_or(0),
            "h" => self.crop_height = value.parse().unwrap_or(0),
            "z" => self.z_index = value.parse().unwrap_or(0),
            "C" => self.cursor_movement = value.parse().unwrap_or(0),
            "q" => self.quiet = value.parse().unwrap_or(0),
            "d" => self.delete_letter = value.chars().next(),
            _ => {
                log::trace!("ignoring unknown graphics key: {key}={value}");
            }
        }
    }

    /// Explicit image ID, treating 0 as unassigned.
    pub fn explicit_image_id(&self) -> Option<u32> {
        self.image_id.filter(|&id| id != 0)
    }

    /// Classify into a validated per-action variant.
    pub fn kind(&self) -> CommandKind {
        match self.action {
            ActionTag::Transmit => CommandKind::Transmit { display: false },
            ActionTag::TransmitAndDisplay => CommandKind::Transmit { display: true },
            ActionTag::Put => match self.explicit_image_id() {
                Some(image_id) => CommandKind::Put(PutCommand {
                    image_id,
                    placement_id: self.placement_id.unwrap_or(0),
                }),
                None => CommandKind::Invalid("put without image id"),
            },
            ActionTag::Delete => CommandKind::Delete(self.delete_target()),
            ActionTag::Query => CommandKind::Query,
            ActionTag::Frame => CommandKind::Unimplemented("frame"),
            ActionTag::Animate => CommandKind::Unimplemented("animate"),
            ActionTag::Compose => CommandKind::Unimplemented("compose"),
        }
    }

    fn delete_target(&self) -> DeleteTarget {
        match self.delete_letter {
            None | Some('a') => DeleteTarget::AllVisible,
            Some('A') => DeleteTarget::Everything,
            Some('i') | Some('I') => match self.explicit_image_id() {
                Some(image_id) => match self.placement_id.filter(|&p| p != 0) {
                    Some(placement_id) => DeleteTarget::Placement {
                        image_id,
                        placement_id,
                    },
                    None => DeleteTarget::Image { image_id },
                },
                None => DeleteTarget::AllVisible,
            },
            Some('c') | Some('C') => DeleteTarget::AtCursor,
            Some('x') | Some('X') => DeleteTarget::AtCursorColumn,
            Some('y') | Some('Y') => DeleteTarget::AtCursorRow,
            Some('z') | Some('Z') => DeleteTarget::ZIndex { z: self.z_index },
            Some(other) => {
                log::debug!("unknown delete target '{other}', treating as all-visible");
                DeleteTarget::AllVisible
            }
        }
    }
}

/// A [`Command`] classified by action, carrying only validated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Store image data; `display` also places it.
    Transmit { display: bool },
    /// Place an already stored image.
    Put(PutCommand),
    /// Remove images or placements.
    Delete(DeleteTarget),
    /// Capability probe; always answered OK.
    Query,
    /// Recognized but deliberately not implemented (animation family).
    Unimplemented(&'static str),
    /// Structurally valid frame whose required fields are missing.
    Invalid(&'static str),
}

/// Validated fields for a put command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutCommand {
    pub image_id: u32,
    pub placement_id: u32,
}

/// What a delete command removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// `d=a` (default): every placement; stored images survive.
    AllVisible,
    /// `d=A`: placements and stored images, including off-screen ones.
    Everything,
    /// `d=i`: one image and its placements.
    Image { image_id: u32 },
    /// `d=i` with `p=`: a single placement.
    Placement { image_id: u32, placement_id: u32 },
    /// `d=c`: placements covering the cursor cell.
    AtCursor,
    /// `d=x`: placements intersecting the cursor's column.
    AtCursorColumn,
    /// `d=y`: placements intersecting the cursor's row.
    AtCursorRow,
    /// `d=z`: placements at an exact z-index.
    ZIndex { z: i32 },
}

/// Outcome of a command, encoded back onto the wire as
/// `ESC _ G [i=<id>][,p=<placement>];<status> ESC \`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub image_id: Option<u32>,
    pub placement_id: Option<u32>,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    /// Error code plus human-readable detail, e.g. `ENOENT:no such image`.
    Error(String),
}

impl Response {
    pub fn ok(image_id: Option<u32>, placement_id: Option<u32>) -> Self {
        Self {
            image_id,
            placement_id,
            status: ResponseStatus::Ok,
        }
    }

    pub fn error(image_id: Option<u32>, code: &str, detail: &str) -> Self {
        Self {
            image_id,
            placement_id: None,
            status: ResponseStatus::Error(format!("{code}:{detail}")),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Render the response frame.
    pub fn encode(&self) -> String {
        let mut out = String::from(FRAME_START);
        if let Some(id) = self.image_id {
            out.push_str(&format!("i={id}"));
            if let Some(p) = self.placement_id {
                out.push_str(&format!(",p={p}"));
            }
        }
        out.push(';');
        match &self.status {
            ResponseStatus::Ok => out.push_str("OK"),
            ResponseStatus::Error(msg) => out.push_str(msg),
        }
        out.push_str(FRAME_END);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transmit() {
        let cmd = Command::parse("a=t,f=32,s=100,v=50,i=1;AAAA");
        assert_eq!(cmd.action, ActionTag::Transmit);
        assert_eq!(cmd.format, Some(PixelFormat::Rgba));
        assert_eq!(cmd.width, Some(100));
        assert_eq!(cmd.height, Some(50));
        assert_eq!(cmd.image_id, Some(1));
        assert_eq!(cmd.payload, "AAAA");
    }

    #[test]
    fn test_parse_default_action_is_transmit_and_display() {
        let cmd = Command::parse("f=100;iVBORw==");
        assert_eq!(cmd.action, ActionTag::TransmitAndDisplay);
        assert_eq!(cmd.format, Some(PixelFormat::Png));
    }

    #[test]
    fn test_parse_placement_fields() {
        let cmd = Command::parse("a=T,f=100,c=20,r=10,X=4,Y=7,x=3,y=5,z=-2;aGk=");
        assert_eq!(cmd.cols, Some(20));
        assert_eq!(cmd.rows, Some(10));
        assert_eq!(cmd.abs_col, Some(4));
        assert_eq!(cmd.abs_row, Some(7));
        assert_eq!(cmd.x_offset, 3);
        assert_eq!(cmd.y_offset, 5);
        assert_eq!(cmd.z_index, -2);
    }

    #[test]
    fn test_parse_malformed_pair_is_dropped() {
        // "garbage" has no '=' and must not poison the rest of the frame.
        let cmd = Command::parse("a=t,garbage,i=9;AA==");
        assert_eq!(cmd.action, ActionTag::Transmit);
        assert_eq!(cmd.image_id, Some(9));
    }

    #[test]
    fn test_parse_no_payload() {
        let cmd = Command::parse("a=d,d=a");
        assert!(cmd.payload.is_empty());
        assert_eq!(cmd.delete_letter, Some('a'));
    }

    #[test]
    fn test_kind_put_requires_image_id() {
        let cmd = Command::parse("a=p,i=3,p=2");
        assert_eq!(
            cmd.kind(),
            CommandKind::Put(PutCommand {
                image_id: 3,
                placement_id: 2
            })
        );

        let cmd = Command::parse("a=p");
        assert!(matches!(cmd.kind(), CommandKind::Invalid(_)));
    }

    #[test]
    fn test_kind_delete_targets() {
        let cmd = Command::parse("a=d");
        assert_eq!(cmd.kind(), CommandKind::Delete(DeleteTarget::AllVisible));

        let cmd = Command::parse("a=d,d=A");
        assert_eq!(cmd.kind(), CommandKind::Delete(DeleteTarget::Everything));

        let cmd = Command::parse("a=d,d=i,i=42");
        assert_eq!(
            cmd.kind(),
            CommandKind::Delete(DeleteTarget::Image { image_id: 42 })
        );

        let cmd = Command::parse("a=d,d=i,i=42,p=7");
        assert_eq!(
            cmd.kind(),
            CommandKind::Delete(DeleteTarget::Placement {
                image_id: 42,
                placement_id: 7
            })
        );

        let cmd = Command::parse("a=d,d=z,z=-3");
        assert_eq!(cmd.kind(), CommandKind::Delete(DeleteTarget::ZIndex { z: -3 }));
    }

    #[test]
    fn test_kind_unimplemented_animation_actions() {
        for (control, name) in [("a=f", "frame"), ("a=a", "animate"), ("a=c", "compose")] {
            let cmd = Command::parse(control);
            assert_eq!(cmd.kind(), CommandKind::Unimplemented(name));
        }
    }

    #[test]
    fn test_chunked_flags() {
        let cmd = Command::parse("a=t,f=32,s=10,v=10,i=1,m=1;AAAA");
        assert!(cmd.more_chunks);
        let cmd = Command::parse("m=0;BBBB");
        assert!(!cmd.more_chunks);
        assert_eq!(cmd.action, ActionTag::TransmitAndDisplay);
    }

    #[test]
    fn test_zero_image_id_is_unassigned() {
        let cmd = Command::parse("a=t,i=0;AAAA");
        assert_eq!(cmd.image_id, Some(0));
        assert_eq!(cmd.explicit_image_id(), None);
    }

    #[test]
    fn test_response_encoding() {
        let resp = Response::ok(Some(4), None);
        assert_eq!(resp.encode(), "\x1b_Gi=4;OK\x1b\\");

        let resp = Response::ok(Some(4), Some(2));
        assert_eq!(resp.encode(), "\x1b_Gi=4,p=2;OK\x1b\\");

        let resp = Response::error(Some(9), "ENOENT", "no such image");
        assert_eq!(resp.encode(), "\x1b_Gi=9;ENOENT:no such image\x1b\\");
    }

    #[test]
    fn test_quiet_levels() {
        let cmd = Command::parse("a=t,q=2,i=1;AAAA");
        assert_eq!(cmd.quiet, 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Structured round-trip: every key present in the control
            /// section must be recoverable from the parsed command.
            #[test]
            fn control_fields_round_trip(
                image_id in proptest::option::of(1u32..100_000),
                placement_id in proptest::option::of(1u32..10_000),
                width in proptest::option::of(1u32..4096),
                height in proptest::option::of(1u32..4096),
                cols in proptest::option::of(1u32..500),
                rows in proptest::option::of(1u32..500),
                z_index in -1000i32..1000,
                quiet in 0u8..3,
                more in any::<bool>(),
            ) {
                let mut control = String::from("a=t");
                if let Some(i) = image_id { control.push_str(&format!(",i={i}")); }
                if let Some(p) = placement_id { control.push_str(&format!(",p={p}")); }
                if let Some(s) = width { control.push_str(&format!(",s={s}")); }
                if let Some(v) = height { control.push_str(&format!(",v={v}")); }
                if let Some(c) = cols { control.push_str(&format!(",c={c}")); }
                if let Some(r) = rows { control.push_str(&format!(",r={r}")); }
                control.push_str(&format!(",z={z_index},q={quiet}"));
                if more { control.push_str(",m=1"); }
                control.push_str(";QUJD");

                let cmd = Command::parse(&control);
                prop_assert_eq!(cmd.action, ActionTag::Transmit);
                prop_assert_eq!(cmd.image_id, image_id);
                prop_assert_eq!(cmd.placement_id, placement_id);
                prop_assert_eq!(cmd.width, width);
                prop_assert_eq!(cmd.height, height);
                prop_assert_eq!(cmd.cols, cols);
                prop_assert_eq!(cmd.rows, rows);
                prop_assert_eq!(cmd.z_index, z_index);
                prop_assert_eq!(cmd.quiet, quiet);
                prop_assert_eq!(cmd.more_chunks, more);
                prop_assert_eq!(cmd.payload.as_str(), "QUJD");
            }

            #[test]
            fn parse_never_panics(interior in ".{0,200}") {
                let _ = Command::parse(&interior);
            }
        }
    }
}
