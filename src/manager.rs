//! Graphics orchestrator.
//!
//! [`GraphicsManager`] owns the parser and the store and wires them to one
//! authoritative text stream. Its central job is command/text
//! interleaving: several command fields are cursor-relative and must be
//! evaluated against the cursor as it stood at that command's position in
//! the stream, so literal text between frames is forwarded to the
//! emulation core before each command executes.
//!
//! All collaborator access goes through the [`TerminalDelegate`]
//! capability trait, injected at construction. Production wires the WASM
//! core bindings; tests use a recording fake.

use crate::codec;
use crate::command::{
    Command, CommandKind, CropRect, PixelFormat, PutCommand, Response, Transmission,
    DeleteTarget, FRAME_START,
};
use crate::config::GraphicsConfig;
use crate::error::GraphicsError;
use crate::parser::{strip_echoes, strip_placeholders, StreamParser};
use crate::render::{self, DrawSurface, Viewport};
use crate::store::{ImageStore, Placement, StoreStats, StoredImage};
use crate::{CellMetrics, CellPosition};

/// Capabilities the orchestrator needs from the surrounding terminal.
///
/// `cursor_position` and `cell_metrics` are required; the rest are
/// optional and default to "not available". The default `send_response`
/// is a no-op: in the popup-display wiring, protocol acknowledgements
/// would leak into the visible stream, so responses are constructed and
/// then dropped at the transport. Inline-rendering hosts override it.
pub trait TerminalDelegate {
    /// Cursor position in buffer-absolute cells.
    fn cursor_position(&self) -> CellPosition;

    /// Current cell size in pixels.
    fn cell_metrics(&self) -> CellMetrics;

    /// Whether [`write_text`](Self::write_text) actually reaches the
    /// emulation core. When false the manager falls back to executing
    /// commands against whatever cursor state currently holds.
    fn writes_text(&self) -> bool {
        false
    }

    /// Forward literal text to the emulation core, advancing its cursor
    /// without graphics interpretation.
    fn write_text(&mut self, _text: &str) {}

    /// Display a decoded image out-of-band. Returning true claims the
    /// image; returning false lets the manager place it inline.
    fn show_popup(&mut self, _image: &StoredImage, _cols: u32, _rows: u32) -> bool {
        false
    }

    /// Transmit a protocol response back to the client.
    fn send_response(&mut self, _response: &str) {}
}

/// The integration point between the text stream, the image store, and
/// the renderer.
pub struct GraphicsManager<D: TerminalDelegate> {
    delegate: D,
    parser: StreamParser,
    store: ImageStore,
    config: GraphicsConfig,
    /// Image ID of a chunked transfer in progress, for continuation
    /// chunks that omit `i=`. At most one anonymous transfer can be
    /// pending; interleaved anonymous transfers are protocol-ambiguous
    /// and deliberately not disambiguated.
    pending_transmit: Option<u32>,
    enabled: bool,
}

impl<D: TerminalDelegate> GraphicsManager<D> {
    pub fn new(config: GraphicsConfig, delegate: D) -> Self {
        Self {
            delegate,
            parser: StreamParser::new(),
            store: ImageStore::new(config),
            config,
            pending_transmit: None,
            enabled: true,
        }
    }

    /// Process one chunk of terminal output, executing any embedded
    /// graphics commands. Returns the text the caller should forward to
    /// the display.
    ///
    /// Chunks must be processed one at a time: feeding overlapping chunks
    /// concurrently breaks the pending-partial-frame invariant. This is a
    /// caller contract, not an internal lock.
    pub fn process(&mut self, chunk: &str) -> String {
        if !self.enabled {
            return chunk.to_string();
        }

        // Stateless cleanup passes run on every chunk, frames or not.
        let text = strip_placeholders(&strip_echoes(chunk));

        // Fast path: ordinary text-heavy traffic skips full parsing.
        if !text.contains(FRAME_START) && !self.parser.has_pending() {
            return text;
        }

        let result = self.parser.parse(&text);
        if !result.has_frames() {
            return result.cleaned;
        }

        if self.delegate.writes_text() {
            // Interleave: advance the emulation core through the literal
            // text preceding each command, then execute the command
            // against the now-correct cursor.
            let mut last_end = 0;
            for frame in &result.frames {
                if frame.start > last_end {
                    self.delegate.write_text(&result.text[last_end..frame.start]);
                }
                self.execute(&frame.command);
                last_end = frame.end;
            }
            // Tail after the last command; a buffered partial frame must
            // never be surfaced as literal text.
            let tail_end = result.pending_start.unwrap_or(result.text.len());
            result.text[last_end..tail_end].to_string()
        } else {
            for frame in &result.frames {
                self.execute(&frame.command);
            }
            result.cleaned
        }
    }

    fn execute(&mut self, cmd: &Command) {
        match cmd.kind() {
            CommandKind::Transmit { display } => self.handle_transmit(cmd, display),
            CommandKind::Put(put) => self.handle_put(cmd, put),
            CommandKind::Delete(target) => self.handle_delete(target),
            CommandKind::Query => {
                self.respond(Response::ok(cmd.image_id, cmd.placement_id), cmd.quiet);
            }
            CommandKind::Unimplemented(name) => {
                log::debug!("ignoring unimplemented graphics action: {name}");
            }
            CommandKind::Invalid(reason) => {
                log::debug!("invalid graphics command: {reason}");
                self.respond(
                    Response::error(cmd.image_id, "EINVAL", reason),
                    cmd.quiet,
                );
            }
        }
    }

    fn handle_transmit(&mut self, cmd: &Command, display: bool) {
        if cmd.transmission != Transmission::Direct {
            log::warn!("refusing non-direct transmission medium");
            self.respond_error(cmd.image_id, &GraphicsError::UnsupportedTransmission, cmd.quiet);
            return;
        }

        let id = cmd
            .explicit_image_id()
            .or(self.pending_transmit)
            .or_else(|| self.store.last_chunk_id())
            .unwrap_or_else(|| self.store.next_auto_id());

        if cmd.more_chunks {
            self.store.add_chunk(id, cmd);
            self.pending_transmit = Some(id);
            return;
        }
        self.pending_transmit = None;

        let (data, format, width, height, compression) = if self.store.has_chunk_buffer(id) {
            // Final chunk: fold it in, then decode the combined payload.
            self.store.add_chunk(id, cmd);
            match self.store.take_chunks(id) {
                Some(buffer) => (
                    codec::combine_chunks(&buffer.chunks),
                    buffer.format.unwrap_or(PixelFormat::Rgba),
                    buffer.width,
                    buffer.height,
                    buffer.compression,
                ),
                None => return,
            }
        } else {
            (
                codec::decode_base64(&cmd.payload),
                cmd.format.unwrap_or(PixelFormat::Rgba),
                cmd.width,
                cmd.height,
                cmd.compression,
            )
        };

        if data.is_empty() {
            self.respond_error(Some(id), &GraphicsError::NoData, cmd.quiet);
            return;
        }

        // Admission heuristic only; real accounting happens after decode.
        let estimated = codec::estimate_size(data.len(), format, width, height);
        if estimated > self.config.max_image_bytes {
            let err = GraphicsError::ImageTooLarge {
                size: estimated,
                max: self.config.max_image_bytes,
            };
            self.respond_error(Some(id), &err, cmd.quiet);
            return;
        }

        // Acknowledge on receipt. The reference protocol acks before full
        // processing; a decode failure after this point is logged only.
        self.respond(Response::ok(Some(id), cmd.placement_id), cmd.quiet);

        match codec::decode_image(&data, format, width, height, compression) {
            Err(err) => log::warn!("image {id} decode failed: {err}"),
            Ok(bitmap) => {
                let (px_width, px_height) = (bitmap.width, bitmap.height);
                match self.store.store_image(id, format, bitmap) {
                    Err(err) => log::warn!("image {id} rejected by store: {err}"),
                    Ok(_) => {
                        if display {
                            self.place(cmd, id, px_width, px_height);
                        }
                    }
                }
            }
        }
    }

    fn handle_put(&mut self, cmd: &Command, put: PutCommand) {
        let Some(image) = self.store.get_image(put.image_id) else {
            self.respond_error(
                Some(put.image_id),
                &GraphicsError::ImageNotFound(put.image_id),
                cmd.quiet,
            );
            return;
        };
        let (px_width, px_height) = (image.width, image.height);
        self.place(cmd, put.image_id, px_width, px_height);
        self.respond(Response::ok(Some(put.image_id), cmd.placement_id), cmd.quiet);
    }

    /// Create a placement for a stored image, resolving display size and
    /// position against the delegate's current state.
    fn place(&mut self, cmd: &Command, id: u32, px_width: u32, px_height: u32) {
        let metrics = self.delegate.cell_metrics();
        let cols = cmd
            .cols
            .filter(|&c| c > 0)
            .unwrap_or_else(|| px_width.div_ceil(metrics.width.max(1)).max(1));
        let rows = cmd
            .rows
            .filter(|&r| r > 0)
            .unwrap_or_else(|| px_height.div_ceil(metrics.height.max(1)).max(1));

        // Popup display takes precedence when the host offers it.
        if let Some(image) = self.store.peek_image(id) {
            if self.delegate.show_popup(image, cols, rows) {
                return;
            }
        }

        let cursor = self.delegate.cursor_position();
        self.store.set_placement(Placement {
            image_id: id,
            placement_id: cmd.placement_id.unwrap_or(0),
            col: cmd.abs_col.unwrap_or(cursor.col),
            row: cmd.abs_row.unwrap_or(cursor.row),
            x_offset: cmd.x_offset,
            y_offset: cmd.y_offset,
            cols,
            rows,
            crop: CropRect {
                x: 0,
                y: 0,
                width: cmd.crop_width,
                height: cmd.crop_height,
            },
            z_index: cmd.z_index,
        });
    }

    fn handle_delete(&mut self, target: DeleteTarget) {
        match target {
            DeleteTarget::AllVisible => self.store.clear_placements(),
            DeleteTarget::Everything => {
                self.store.clear();
                self.pending_transmit = None;
            }
            DeleteTarget::Image { image_id } => {
                if !self.store.remove_image(image_id) {
                    log::debug!("delete for unknown image {image_id}");
                }
            }
            DeleteTarget::Placement {
                image_id,
                placement_id,
            } => {
                self.store.remove_placement(image_id, placement_id);
            }
            DeleteTarget::AtCursor => {
                let cursor = self.delegate.cursor_position();
                self.store.remove_placements_at(cursor.col, cursor.row);
            }
            DeleteTarget::AtCursorColumn => {
                let cursor = self.delegate.cursor_position();
                self.store.remove_placements_in_column(cursor.col);
            }
            DeleteTarget::AtCursorRow => {
                let cursor = self.delegate.cursor_position();
                self.store.remove_placements_in_row(cursor.row);
            }
            DeleteTarget::ZIndex { z } => {
                self.store.remove_placements_with_z(z);
            }
        }
    }

    fn respond_error(&mut self, image_id: Option<u32>, err: &GraphicsError, quiet: u8) {
        self.respond(
            Response::error(image_id, err.wire_code(), &err.to_string()),
            quiet,
        );
    }

    fn respond(&mut self, response: Response, quiet: u8) {
        let suppressed = if response.is_ok() {
            quiet >= 1
        } else {
            quiet >= 2
        };
        if suppressed {
            return;
        }
        self.delegate.send_response(&response.encode());
    }

    /// Draw visible placements layered under the text plane.
    pub fn render_below_text(&self, viewport: &Viewport, surface: &mut dyn DrawSurface) {
        render::render_below_text(&self.store, viewport, surface);
    }

    /// Draw visible placements layered over the text plane.
    pub fn render_above_text(&self, viewport: &Viewport, surface: &mut dyn DrawSurface) {
        render::render_above_text(&self.store, viewport, surface);
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Disable to pass chunks through verbatim (no stripping, no parsing).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drop all images, placements, chunk buffers, and parser state.
    pub fn clear(&mut self) {
        self.store.clear();
        self.parser.reset();
        self.pending_transmit = None;
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_base64;

    /// Recording fake for the delegate seam.
    struct FakeDelegate {
        cursor: CellPosition,
        cell: CellMetrics,
        interleave: bool,
        popup: bool,
        written: Vec<String>,
        responses: Vec<String>,
        popups: Vec<u32>,
    }

    impl FakeDelegate {
        fn new() -> Self {
            Self {
                cursor: CellPosition { col: 0, row: 0 },
                cell: CellMetrics {
                    width: 10,
                    height: 20,
                },
                interleave: false,
                popup: false,
                written: Vec::new(),
                responses: Vec::new(),
                popups: Vec::new(),
            }
        }
    }

    impl TerminalDelegate for FakeDelegate {
        fn cursor_position(&self) -> CellPosition {
            self.cursor
        }

        fn cell_metrics(&self) -> CellMetrics {
            self.cell
        }

        fn writes_text(&self) -> bool {
            self.interleave
        }

        fn write_text(&mut self, text: &str) {
            // Crude cursor model: every character advances one column.
            self.cursor.col += text.chars().count() as u32;
            self.written.push(text.to_string());
        }

        fn show_popup(&mut self, image: &StoredImage, _cols: u32, _rows: u32) -> bool {
            if self.popup {
                self.popups.push(image.id);
            }
            self.popup
        }

        fn send_response(&mut self, response: &str) {
            self.responses.push(response.to_string());
        }
    }

    fn manager() -> GraphicsManager<FakeDelegate> {
        GraphicsManager::new(GraphicsConfig::default(), FakeDelegate::new())
    }

    /// A 2x2 RGBA transmit-and-display frame.
    fn rgba_frame(id: u32, extra: &str) -> String {
        let payload = encode_base64(&[255u8; 2 * 2 * 4]);
        format!("\x1b_Ga=T,f=32,s=2,v=2,i={id}{extra};{payload}\x1b\\")
    }

    #[test]
    fn test_fast_path_returns_text_unchanged() {
        let mut mgr = manager();
        assert_eq!(mgr.process("plain output\n"), "plain output\n");
    }

    #[test]
    fn test_transmit_stores_without_placing() {
        let mut mgr = manager();
        let payload = encode_base64(&[0u8; 4]);
        let out = mgr.process(&format!("\x1b_Ga=t,f=32,s=1,v=1,i=7;{payload}\x1b\\"));
        assert_eq!(out, "");
        assert!(mgr.store().has_image(7));
        assert_eq!(mgr.store().placement_count(), 0);
        assert_eq!(mgr.delegate().responses, vec!["\x1b_Gi=7;OK\x1b\\"]);
    }

    #[test]
    fn test_transmit_and_display_places_at_cursor() {
        let mut mgr = manager();
        mgr.delegate_mut().cursor = CellPosition { col: 5, row: 40 };
        mgr.process(&rgba_frame(3, ""));

        let placement = mgr.store().get_placement(3, 0).unwrap();
        assert_eq!(placement.col, 5);
        assert_eq!(placement.row, 40);
        // 2x2 pixels in 10x20 cells rounds up to one cell.
        assert_eq!(placement.cols, 1);
        assert_eq!(placement.rows, 1);
    }

    #[test]
    fn test_absolute_position_overrides_cursor() {
        let mut mgr = manager();
        mgr.delegate_mut().cursor = CellPosition { col: 5, row: 40 };
        mgr.process(&rgba_frame(3, ",X=2,Y=9,z=-1"));

        let placement = mgr.store().get_placement(3, 0).unwrap();
        assert_eq!(placement.col, 2);
        assert_eq!(placement.row, 9);
        assert_eq!(placement.z_index, -1);
    }

    #[test]
    fn test_chunked_transfer_completes_without_explicit_id() {
        let mut mgr = manager();
        let pixels: Vec<u8> = vec![9u8; 2 * 2 * 4];
        let encoded = encode_base64(&pixels);
        let (first, second) = encoded.split_at(8);

        mgr.process(&format!("\x1b_Ga=t,f=32,s=2,v=2,i=5,m=1;{first}\x1b\\"));
        assert_eq!(mgr.store().image_count(), 0);
        assert!(mgr.store().has_chunk_buffer(5));

        // Continuation omits i=; it must land on the pending transfer.
        mgr.process(&format!("\x1b_Gm=0;{second}\x1b\\"));
        assert_eq!(mgr.store().image_count(), 1);
        assert!(!mgr.store().has_chunk_buffer(5));
        let image = mgr.store().peek_image(5).unwrap();
        assert_eq!(image.bitmap.as_ref().unwrap().rgba, pixels);
    }

    #[test]
    fn test_put_requires_existing_image() {
        let mut mgr = manager();
        mgr.process("\x1b_Ga=p,i=99\x1b\\");
        assert_eq!(mgr.store().placement_count(), 0);
        assert_eq!(
            mgr.delegate().responses,
            vec!["\x1b_Gi=99;ENOENT:no such image: 99\x1b\\"]
        );
    }

    #[test]
    fn test_put_places_stored_image() {
        let mut mgr = manager();
        let payload = encode_base64(&[0u8; 4]);
        mgr.process(&format!("\x1b_Ga=t,f=32,s=1,v=1,i=4;{payload}\x1b\\"));
        mgr.delegate_mut().responses.clear();

        mgr.process("\x1b_Ga=p,i=4,p=2,c=3,r=2\x1b\\");
        let placement = mgr.store().get_placement(4, 2).unwrap();
        assert_eq!(placement.cols, 3);
        assert_eq!(placement.rows, 2);
        assert_eq!(mgr.delegate().responses, vec!["\x1b_Gi=4,p=2;OK\x1b\\"]);
    }

    #[test]
    fn test_delete_at_cursor_uses_current_position() {
        let mut mgr = manager();
        mgr.delegate_mut().cursor = CellPosition { col: 0, row: 10 };
        mgr.process(&rgba_frame(1, ""));
        assert_eq!(mgr.store().placement_count(), 1);

        // Move the cursor elsewhere: delete-at-cursor misses.
        mgr.delegate_mut().cursor = CellPosition { col: 50, row: 50 };
        mgr.process("\x1b_Ga=d,d=c\x1b\\");
        assert_eq!(mgr.store().placement_count(), 1);

        mgr.delegate_mut().cursor = CellPosition { col: 0, row: 10 };
        mgr.process("\x1b_Ga=d,d=c\x1b\\");
        assert_eq!(mgr.store().placement_count(), 0);
    }

    #[test]
    fn test_delete_everything_clears_images_too() {
        let mut mgr = manager();
        mgr.process(&rgba_frame(1, ""));
        mgr.process("\x1b_Ga=d,d=A\x1b\\");
        assert_eq!(mgr.store().image_count(), 0);
        assert_eq!(mgr.store().placement_count(), 0);
    }

    #[test]
    fn test_delete_default_keeps_images() {
        let mut mgr = manager();
        mgr.process(&rgba_frame(1, ""));
        mgr.process("\x1b_Ga=d\x1b\\");
        assert_eq!(mgr.store().image_count(), 1);
        assert_eq!(mgr.store().placement_count(), 0);
    }

    #[test]
    fn test_query_always_succeeds() {
        let mut mgr = manager();
        mgr.process("\x1b_Ga=q,i=31,s=1,v=1,f=32;AAAAAA==\x1b\\");
        assert_eq!(mgr.delegate().responses, vec!["\x1b_Gi=31;OK\x1b\\"]);
    }

    #[test]
    fn test_animation_actions_are_silent_noops() {
        let mut mgr = manager();
        for action in ["f", "a", "c"] {
            let out = mgr.process(&format!("\x1b_Ga={action},i=1;AAAA\x1b\\"));
            assert_eq!(out, "");
        }
        assert!(mgr.delegate().responses.is_empty());
        assert_eq!(mgr.store().image_count(), 0);
    }

    #[test]
    fn test_no_data_failure() {
        let mut mgr = manager();
        mgr.process("\x1b_Ga=t,f=32,s=1,v=1,i=6\x1b\\");
        assert_eq!(
            mgr.delegate().responses,
            vec!["\x1b_Gi=6;ENODATA:no image data supplied\x1b\\"]
        );
        assert_eq!(mgr.store().image_count(), 0);
    }

    #[test]
    fn test_decode_failure_leaves_no_state() {
        let mut mgr = manager();
        // Declared 4x4 but only one pixel of data: decode fails after ack.
        let payload = encode_base64(&[0u8; 4]);
        mgr.process(&format!("\x1b_Ga=T,f=32,s=4,v=4,i=8;{payload}\x1b\\"));
        assert_eq!(mgr.store().image_count(), 0);
        assert_eq!(mgr.store().placement_count(), 0);
        // The ack went out before the decode (protocol-fidelity tradeoff).
        assert_eq!(mgr.delegate().responses, vec!["\x1b_Gi=8;OK\x1b\\"]);
    }

    #[test]
    fn test_quiet_levels_suppress_responses() {
        let mut mgr = manager();
        let payload = encode_base64(&[0u8; 4]);
        mgr.process(&format!("\x1b_Ga=t,f=32,s=1,v=1,i=1,q=1;{payload}\x1b\\"));
        assert!(mgr.delegate().responses.is_empty());

        // q=1 still reports failures.
        mgr.process("\x1b_Ga=t,f=32,s=1,v=1,i=2,q=1\x1b\\");
        assert_eq!(mgr.delegate().responses.len(), 1);

        // q=2 reports nothing at all.
        mgr.delegate_mut().responses.clear();
        mgr.process("\x1b_Ga=t,f=32,s=1,v=1,i=3,q=2\x1b\\");
        assert!(mgr.delegate().responses.is_empty());
    }

    #[test]
    fn test_unsupported_transmission_is_refused() {
        let mut mgr = manager();
        mgr.process("\x1b_Ga=t,t=f,i=1;L3RtcC94\x1b\\");
        assert_eq!(mgr.store().image_count(), 0);
        assert_eq!(
            mgr.delegate().responses,
            vec!["\x1b_Gi=1;EBADTRANS:unsupported transmission medium\x1b\\"]
        );
    }

    #[test]
    fn test_popup_display_claims_image() {
        let mut mgr = manager();
        mgr.delegate_mut().popup = true;
        mgr.process(&rgba_frame(12, ""));
        assert_eq!(mgr.delegate().popups, vec![12]);
        assert_eq!(mgr.store().placement_count(), 0);
        assert!(mgr.store().has_image(12));
    }

    #[test]
    fn test_interleaved_text_advances_cursor_between_commands() {
        let mut mgr = manager();
        mgr.delegate_mut().interleave = true;
        let payload = encode_base64(&[0u8; 4]);
        // "hello" advances the cursor to column 5 before the display
        // command runs; "!!" lands in the returned tail.
        let chunk = format!("hello\x1b_Ga=T,f=32,s=1,v=1,i=2;{payload}\x1b\\!!");
        let out = mgr.process(&chunk);
        assert_eq!(out, "!!");
        assert_eq!(mgr.delegate().written, vec!["hello".to_string()]);
        let placement = mgr.store().get_placement(2, 0).unwrap();
        assert_eq!(placement.col, 5);
    }

    #[test]
    fn test_tail_truncated_at_pending_frame() {
        let mut mgr = manager();
        mgr.delegate_mut().interleave = true;
        let payload = encode_base64(&[0u8; 4]);
        let chunk = format!(
            "\x1b_Ga=t,f=32,s=1,v=1,i=2;{payload}\x1b\\tail\x1b_Ga=t,f=32,s=1,v=1,i=3"
        );
        let out = mgr.process(&chunk);
        // The half-received second frame must not leak into the output.
        assert_eq!(out, "tail");

        let out = mgr.process(";AAAAAA==\x1b\\");
        assert_eq!(out, "");
        assert!(mgr.store().has_image(3));
    }

    #[test]
    fn test_disabled_passthrough() {
        let mut mgr = manager();
        mgr.set_enabled(false);
        let frame = rgba_frame(1, "");
        assert_eq!(mgr.process(&frame), frame);
        assert_eq!(mgr.store().image_count(), 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut mgr = manager();
        mgr.process(&rgba_frame(1, ""));
        mgr.process("\x1b_Ga=t,i=9,m=1;AAAA\x1b\\");
        mgr.clear();
        let stats = mgr.stats();
        assert_eq!(stats.images, 0);
        assert_eq!(stats.placements, 0);
        assert_eq!(stats.open_chunk_buffers, 0);
    }

    #[test]
    fn test_echoed_response_stripped_from_stream() {
        let mut mgr = manager();
        assert_eq!(mgr.process("$ i=4;OK\n"), "$ \n");
        assert_eq!(mgr.process("i=four"), "i=four");
    }
}
