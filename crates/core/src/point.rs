/// One point with all of its stored fields, as read from or written to disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub color: [u8; 3],
    pub views: u8,
}
