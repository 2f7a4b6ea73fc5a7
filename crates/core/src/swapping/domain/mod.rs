pub mod face_swapper;
pub mod paste_back;
