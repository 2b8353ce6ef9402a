use crate::config::ViewConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Zoom and page position; per session, never persisted
#[derive(Debug, Clone)]
pub struct ViewState {
    pub current_page: usize,
    pub page_count: usize,
    pub zoom_level: f32,
    min_zoom: f32,
    max_zoom: f32,
    zoom_step: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl ViewState {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            current_page: 0,
            page_count: 0,
            zoom_level: 1.0_f32.clamp(config.min_zoom, config.max_zoom),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
        }
    }

    pub fn set_page_count(&mut self, count: usize) {
        self.page_count = count;
        if self.current_page >= count {
            self.current_page = 0;
        }
    }

    /// Step the zoom, clamped to the configured bounds.
    /// Returns false when already at the bound.
    pub fn zoom(&mut self, direction: ZoomDirection) -> bool {
        let next = match direction {
            ZoomDirection::In => (self.zoom_level + self.zoom_step).min(self.max_zoom),
            ZoomDirection::Out => (self.zoom_level - self.zoom_step).max(self.min_zoom),
        };
        // Snap away accumulated float drift from repeated steps
        let next = (next * 1000.0).round() / 1000.0;
        if (next - self.zoom_level).abs() < f32::EPSILON {
            return false;
        }
        self.zoom_level = next;
        true
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page >= self.page_count || page == self.current_page {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn zoom_bounds(&self) -> (f32, f32) {
        (self.min_zoom, self.max_zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_is_clamped() {
        let mut view = ViewState::default();
        for _ in 0..20 {
            view.zoom(ZoomDirection::In);
        }
        assert_eq!(view.zoom_level, 3.0);
        assert!(!view.zoom(ZoomDirection::In));

        for _ in 0..20 {
            view.zoom(ZoomDirection::Out);
        }
        assert_eq!(view.zoom_level, 0.5);
        assert!(!view.zoom(ZoomDirection::Out));
    }

    #[test]
    fn test_zoom_steps() {
        let mut view = ViewState::default();
        assert!(view.zoom(ZoomDirection::In));
        assert!((view.zoom_level - 1.2).abs() < 1e-4);
        assert!(view.zoom(ZoomDirection::Out));
        assert!((view.zoom_level - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_page_navigation_bounds() {
        let mut view = ViewState::default();
        view.set_page_count(2);
        assert!(view.go_to_page(1));
        assert!(!view.go_to_page(2));
        assert_eq!(view.current_page, 1);
    }
}
