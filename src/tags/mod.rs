// Tag dictionaries carried in codec comment headers

pub mod vorbis_comment;

pub use vorbis_comment::VorbisComment;
