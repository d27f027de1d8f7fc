use crate::{rehydrate, DrawingPayload, StageSize, Stroke};

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLayer {
    pub participant_id: i64,
    pub label: String,
    pub strokes: Vec<Stroke>,
    pub visible: bool,
}

/// Independently toggled drawing layers stacked over one background.
#[derive(Clone, Debug, Default)]
pub struct OverlayLayers {
    layers: Vec<OverlayLayer>,
}

impl OverlayLayers {
    /// Each payload is rescaled on its own against `target`; every layer
    /// starts visible.
    pub fn build<I>(entries: I, target: StageSize) -> Self
    where
        I: IntoIterator<Item = (i64, String, DrawingPayload)>,
    {
        let layers = entries
            .into_iter()
            .map(|(participant_id, label, payload)| OverlayLayer {
                participant_id,
                label,
                strokes: rehydrate(&payload, target),
                visible: true,
            })
            .collect();
        Self { layers }
    }

    pub fn layers(&self) -> &[OverlayLayer] {
        &self.layers
    }

    pub fn set_visible(&mut self, participant_id: i64, visible: bool) -> bool {
        match self
            .layers
            .iter_mut()
            .find(|layer| layer.participant_id == participant_id)
        {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Flips one layer and returns its new visibility.
    pub fn toggle(&mut self, participant_id: i64) -> Option<bool> {
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.participant_id == participant_id)?;
        layer.visible = !layer.visible;
        Some(layer.visible)
    }

    pub fn visible(&self) -> impl Iterator<Item = &OverlayLayer> {
        self.layers.iter().filter(|layer| layer.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    fn payload(stage: f64) -> DrawingPayload {
        DrawingPayload {
            shapes: vec![Stroke::Draw {
                color: "#111".into(),
                width: 2.0,
                points: vec![Point { x: 10.0, y: 10.0 }],
            }],
            stage: Some(StageSize::new(stage, stage)),
        }
    }

    fn layer(layers: &OverlayLayers, participant_id: i64) -> &OverlayLayer {
        layers
            .layers()
            .iter()
            .find(|layer| layer.participant_id == participant_id)
            .unwrap()
    }

    #[test]
    fn layers_rescale_independently() {
        let layers = OverlayLayers::build(
            vec![(1, "P-1".into(), payload(100.0)), (2, "P-2".into(), payload(200.0))],
            StageSize::new(100.0, 100.0),
        );
        assert_eq!(layer(&layers, 1).strokes[0].points()[0], Point { x: 10.0, y: 10.0 });
        assert_eq!(layer(&layers, 2).strokes[0].points()[0], Point { x: 5.0, y: 5.0 });
    }

    #[test]
    fn toggling_one_layer_leaves_others_alone() {
        let mut layers = OverlayLayers::build(
            vec![(1, "P-1".into(), payload(100.0)), (2, "P-2".into(), payload(100.0))],
            StageSize::new(100.0, 100.0),
        );
        assert_eq!(layers.toggle(1), Some(false));
        assert!(layer(&layers, 2).visible);
        assert_eq!(
            layers.visible().map(|l| l.participant_id).collect::<Vec<_>>(),
            vec![2]
        );
        assert!(layers.set_visible(1, true));
        assert_eq!(layers.visible().count(), 2);
        assert_eq!(layers.toggle(42), None);
        assert!(!layers.set_visible(42, false));
    }
}
