//! JPEG-encodes frames for the streamer.

use rover_vision::image::Frame;

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Vec<u8> {
    let image = turbojpeg::Image {
        pixels: &frame[..],
        width: frame.width() as usize,
        pitch: frame.width() as usize * 3,
        height: frame.height() as usize,
        format: turbojpeg::PixelFormat::RGB,
    };

    match turbojpeg::compress(image, quality as i32, turbojpeg::Subsamp::Sub2x2) {
        Ok(buf) => buf.to_vec(),
        Err(e) => {
            tracing::warn!(error = %e, "jpeg encode failed, dropping frame");
            Vec::new()
        }
    }
}
