// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Draw decorators.
//!
//! Rather than patching the engine's draw routines, the host registers them in a
//! [DrawTable] and the table wraps each one so its draws are attributed to the
//! object being drawn.

use std::collections::{HashMap, HashSet};

use super::ObjectId;
use crate::draw::{DrawContext, DrawError};
use crate::host::Interpolated;

/// A host draw routine for objects of type `T`.
pub type DrawFn<T> = Box<dyn FnMut(&mut T, &mut DrawContext) -> Result<(), DrawError>>;

/// Runs `draw` with `object` as the current interpolation record.
///
/// With interpolation disabled, `draw` runs untracked.
pub fn interpolated<R>(
    context: &mut DrawContext,
    object: ObjectId,
    draw: impl FnOnce(&mut DrawContext) -> R,
) -> R {
    if !context.interpolation().is_enabled() {
        return draw(context);
    }
    let prior = context.interpolation_mut().enter(object);
    let result = draw(context);
    context.interpolation_mut().exit(prior);
    result
}

/// Decorates `draw` so every call is tracked under the object's id.
pub fn wrap<T, F>(mut draw: F) -> DrawFn<T>
where
    T: Interpolated + 'static,
    F: FnMut(&mut T, &mut DrawContext) -> Result<(), DrawError> + 'static,
{
    Box::new(move |object: &mut T, context: &mut DrawContext| {
        let id = object.interpolation_id();
        interpolated(context, id, |context| draw(object, context))
    })
}

/// Draw routines by object kind.
pub struct DrawTable<T> {
    entries: HashMap<String, DrawFn<T>>,
    wrapped: HashSet<String>,
}

impl<T> std::fmt::Debug for DrawTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawTable")
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .field("wrapped", &self.wrapped)
            .finish()
    }
}

impl<T: Interpolated + 'static> Default for DrawTable<T> {
    fn default() -> Self {
        DrawTable::new()
    }
}

impl<T: Interpolated + 'static> DrawTable<T> {
    pub fn new() -> Self {
        DrawTable {
            entries: HashMap::new(),
            wrapped: HashSet::new(),
        }
    }

    pub fn insert(&mut self, kind: impl Into<String>, draw: DrawFn<T>) {
        let kind = kind.into();
        self.wrapped.remove(&kind);
        self.entries.insert(kind, draw);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_wrapped(&self, kind: &str) -> bool {
        self.wrapped.contains(kind)
    }

    /// Wraps every routine except those of `excluded` kinds.
    pub fn wrap_all(mut self, excluded: &[&str]) -> Self {
        let kinds: Vec<String> = self.entries.keys().cloned().collect();
        for kind in kinds {
            if excluded.contains(&kind.as_str()) || self.wrapped.contains(&kind) {
                continue;
            }
            if let Some(mut inner) = self.entries.remove(&kind) {
                self.entries.insert(
                    kind.clone(),
                    wrap(move |object: &mut T, context: &mut DrawContext| inner(object, context)),
                );
                self.wrapped.insert(kind);
            }
        }
        self
    }

    /// Draws `object` with the routine for `kind`.  `Ok(false)` if there is none.
    pub fn draw(
        &mut self,
        kind: &str,
        object: &mut T,
        context: &mut DrawContext,
    ) -> Result<bool, DrawError> {
        match self.entries.get_mut(kind) {
            Some(draw) => draw(object, context).map(|_| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::link;

    struct Sprite {
        id: ObjectId,
        x: f64,
        seen: Vec<f64>,
    }

    impl Interpolated for Sprite {
        fn interpolation_id(&self) -> ObjectId {
            self.id
        }
    }

    fn draw_sprite(sprite: &mut Sprite, context: &mut DrawContext) -> Result<(), DrawError> {
        let d = context.interpolation_mut().delta_x(sprite.x);
        sprite.seen.push(d);
        Ok(())
    }

    fn context() -> DrawContext {
        let (link, _endpoint) = link::channel();
        DrawContext::new(&PipelineConfig::default(), link)
    }

    #[test]
    fn wrapped_draws_track_per_object() {
        let mut context = context();
        let mut table = DrawTable::new();
        table.insert("sprite", Box::new(draw_sprite) as DrawFn<Sprite>);
        table.insert("item", Box::new(draw_sprite) as DrawFn<Sprite>);
        let mut table = table.wrap_all(&["item"]);
        assert!(table.is_wrapped("sprite"));
        assert!(!table.is_wrapped("item"));

        let mut sprite = Sprite {
            id: ObjectId(5),
            x: 1.0,
            seen: Vec::new(),
        };
        context.interpolation_mut().set_current_tick(1);
        assert!(table.draw("sprite", &mut sprite, &mut context).unwrap());
        context.interpolation_mut().set_current_tick(2);
        sprite.x = 3.0;
        table.draw("sprite", &mut sprite, &mut context).unwrap();
        assert_eq!(sprite.seen, vec![0.0, 2.0]);

        //excluded kinds fall back to the scroll delta
        table.draw("item", &mut sprite, &mut context).unwrap();
        assert_eq!(sprite.seen[2], 0.0);
        assert!(!table.draw("missing", &mut sprite, &mut context).unwrap());
        assert_eq!(context.interpolation().current(), None);
    }

    #[test]
    fn disabled_interpolation_passes_through() {
        let mut context = context();
        context.interpolation_mut().set_enabled(false);
        let mut draw = wrap::<Sprite, _>(draw_sprite);
        let mut sprite = Sprite {
            id: ObjectId(1),
            x: 8.0,
            seen: Vec::new(),
        };
        draw(&mut sprite, &mut context).unwrap();
        assert_eq!(context.interpolation().record_count(), 0);
    }

    #[test]
    fn wrapping_twice_is_idempotent() {
        let mut table: DrawTable<Sprite> = DrawTable::new();
        table.insert("sprite", Box::new(draw_sprite));
        let table = table.wrap_all(&[]).wrap_all(&[]);
        assert_eq!(table.len(), 1);
        assert!(table.is_wrapped("sprite"));
    }
}
