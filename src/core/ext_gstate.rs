//! Graphics state parameter dictionaries (`gs` operator, PDF 8.4.5).

use super::font::Font;
use super::library::Library;
use super::parser::Dict;
use crate::rendering::graphics_state::{BlendMode, GraphicsState, LineCap, LineJoin};
use std::sync::Arc;

/// The subset of an ExtGState dictionary that affects shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtGState {
    pub line_width: Option<f64>,
    pub line_cap: Option<LineCap>,
    pub line_join: Option<LineJoin>,
    pub miter_limit: Option<f64>,
    pub dash: Option<(Vec<f64>, f64)>,
    pub stroke_alpha: Option<f64>,
    pub fill_alpha: Option<f64>,
    pub blend_mode: Option<BlendMode>,
    pub font: Option<(Arc<Font>, f64)>,
}

impl ExtGState {
    pub fn parse(library: &Library, dict: &Dict) -> ExtGState {
        let dash = library.get_array(dict, "D").and_then(|d| {
            let pattern = library.number_array(d.first()?)?;
            let phase = library.resolve(d.get(1)?).as_f64()?;
            Some((pattern, phase))
        });

        // /BM may be a name or an array of names, the first known one wins.
        let blend_mode = library.get_object(dict, "BM").and_then(|bm| match bm.as_array() {
            Some(names) => names
                .iter()
                .filter_map(|n| library.resolve(n).as_name())
                .find_map(BlendMode::from_name),
            None => bm.as_name().and_then(BlendMode::from_name),
        });

        let font = library.get_array(dict, "Font").and_then(|entry| {
            let font_dict = library.resolve(entry.first()?).as_dict()?;
            let size = library.resolve(entry.get(1)?).as_f64()?;
            let name = entry
                .first()
                .and_then(|f| f.as_obj_ref())
                .map_or_else(String::new, |r| r.to_string());
            Some((Arc::new(Font::from_dict(library, &name, font_dict)), size))
        });

        ExtGState {
            line_width: library.get_number(dict, "LW"),
            line_cap: library.get_int(dict, "LC").and_then(LineCap::from_i64),
            line_join: library.get_int(dict, "LJ").and_then(LineJoin::from_i64),
            miter_limit: library.get_number(dict, "ML"),
            dash,
            stroke_alpha: library.get_number(dict, "CA"),
            fill_alpha: library.get_number(dict, "ca"),
            blend_mode,
            font,
        }
    }

    /// Copies every present parameter into `state`.
    pub fn apply(&self, state: &mut GraphicsState) {
        let stroke = &mut state.stroke_props;
        if let Some(width) = self.line_width {
            stroke.line_width = width;
        }
        if let Some(cap) = self.line_cap {
            stroke.line_cap = cap;
        }
        if let Some(join) = self.line_join {
            stroke.line_join = join;
        }
        if let Some(limit) = self.miter_limit {
            stroke.miter_limit = limit;
        }
        if let Some((pattern, phase)) = &self.dash {
            stroke.dash_array = pattern.clone();
            stroke.dash_offset = *phase;
        }
        if let Some(alpha) = self.stroke_alpha {
            state.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(alpha) = self.fill_alpha {
            state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(mode) = self.blend_mode {
            state.blend_mode = mode;
        }
        if let Some((font, size)) = &self.font {
            state.text.font_name = Some(font.name.clone());
            state.text.font = Some(font.clone());
            state.text.font_size = *size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;

    #[test]
    fn test_parse_and_apply() {
        let object = Parser::from_bytes(
            b"<< /LW 3 /LC 1 /LJ 2 /ML 4 /D [[2 1] 0.5] /CA 0.5 /ca 2 /BM [/Foo /Multiply] >>"
                .to_vec(),
        )
        .get_object()
        .unwrap();
        let gs = ExtGState::parse(&Library::default(), object.as_dict().unwrap());
        assert_eq!(gs.blend_mode, Some(BlendMode::Multiply));

        let mut state = GraphicsState::default();
        gs.apply(&mut state);
        assert_eq!(state.stroke_props.line_width, 3.0);
        assert_eq!(state.stroke_props.line_cap, LineCap::Round);
        assert_eq!(state.stroke_props.line_join, LineJoin::Bevel);
        assert_eq!(state.stroke_props.miter_limit, 4.0);
        assert_eq!(state.stroke_props.dash_array, vec![2.0, 1.0]);
        assert_eq!(state.stroke_props.dash_offset, 0.5);
        assert_eq!(state.stroke_alpha, 0.5);
        assert_eq!(state.fill_alpha, 1.0);
    }

    #[test]
    fn test_absent_entries_leave_state_alone() {
        let mut state = GraphicsState::default();
        state.stroke_props.line_width = 7.0;
        ExtGState::default().apply(&mut state);
        assert_eq!(state.stroke_props.line_width, 7.0);
    }
}
