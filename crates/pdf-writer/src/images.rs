//! Image XObject emission.
//!
//! Turns a decoded [`png_import::PngImage`] into the object graph a page can
//! reference: the image stream itself, plus any soft mask, stencil mask, or
//! ICC profile stream it needs. When the decoder kept the source's deflated
//! IDAT, the stream reuses those bytes and declares `/DecodeParms` with
//! `/Predictor 15` so the PDF reader inverts PNG's own row filters.

use png_import::{ColorSpace, PngImage, SoftMask};

use crate::objects::{fmt_num, ObjId, ObjectWriter, StreamPayload};
use crate::PdfError;

pub(crate) struct ImageResource {
    pub image: PngImage,
    /// Pre-allocated image object id; pages reference `/X<id>`.
    pub id: ObjId,
}

impl ImageResource {
    /// Preferred display size in points, from the pHYs density when present
    /// (falling back to 96 px/inch).
    pub fn display_size(&self) -> (f64, f64) {
        let (dpi_x, dpi_y) = self.image.dpi.unwrap_or((96.0, 96.0));
        (
            self.image.width as f64 * 72.0 / dpi_x,
            self.image.height as f64 * 72.0 / dpi_y,
        )
    }

    pub fn write_objects(&self, writer: &mut ObjectWriter) -> Result<(), PdfError> {
        let image = &self.image;

        let smask_id = match &image.smask {
            Some(mask) => Some(write_soft_mask(writer, image, mask)?),
            None => None,
        };
        let stencil_id = match &image.stencil {
            Some(mask) => Some(write_stencil(writer, image, mask)?),
            None => None,
        };
        let color_space = serialize_color_space(writer, &image.color_space)?;

        let mut dict = format!(
            "/Type/XObject/Subtype/Image/Width {}/Height {}/ColorSpace {}/BitsPerComponent {}",
            image.width, image.height, color_space, image.bits_per_component,
        );
        if let Some(id) = smask_id {
            dict.push_str(&format!("/SMask {id}"));
        }
        if let Some(id) = stencil_id {
            dict.push_str(&format!("/Mask {id}"));
        }
        if let Some(values) = &image.color_key {
            dict.push_str("/Mask[");
            for &value in values {
                dict.push_str(&format!("{value} {value} "));
            }
            dict.pop();
            dict.push(']');
        }

        match &image.verbatim_idat {
            Some(idat) => {
                dict.push_str(&format!(
                    "/DecodeParms<</Predictor 15/Colors {}/BitsPerComponent {}/Columns {}>>",
                    image.components, image.bits_per_component, image.width,
                ));
                writer.put_stream(self.id, &dict, StreamPayload::Deflated(idat))?;
            }
            None => {
                writer.put_stream(self.id, &dict, StreamPayload::Plain(&image.raw))?;
            }
        }
        Ok(())
    }
}

fn write_soft_mask(
    writer: &mut ObjectWriter,
    image: &PngImage,
    mask: &SoftMask,
) -> Result<ObjId, PdfError> {
    let dict = format!(
        "/Type/XObject/Subtype/Image/Width {}/Height {}/ColorSpace/DeviceGray/BitsPerComponent {}",
        image.width, image.height, mask.bits_per_component,
    );
    writer.put_new_stream(&dict, StreamPayload::Plain(&mask.data))
}

fn write_stencil(
    writer: &mut ObjectWriter,
    image: &PngImage,
    mask: &SoftMask,
) -> Result<ObjId, PdfError> {
    let dict = format!(
        "/Type/XObject/Subtype/Image/Width {}/Height {}/ImageMask true/BitsPerComponent 1/Decode[0 1]",
        image.width, image.height,
    );
    writer.put_new_stream(&dict, StreamPayload::Plain(&mask.data))
}

/// Serializes a colourspace, emitting any stream objects it references
/// (ICC profiles). Palette lookup data is written as a hex string.
fn serialize_color_space(
    writer: &mut ObjectWriter,
    color_space: &ColorSpace,
) -> Result<String, PdfError> {
    Ok(match color_space {
        ColorSpace::DeviceGray => "/DeviceGray".to_string(),
        ColorSpace::DeviceRgb => "/DeviceRGB".to_string(),
        ColorSpace::CalGray { white_point, gamma } => format!(
            "[/CalGray<</WhitePoint[{}]/Gamma {}>>]",
            fmt_triplet(white_point),
            fmt_num(*gamma),
        ),
        ColorSpace::CalRgb {
            white_point,
            gamma,
            matrix,
        } => {
            let matrix_text = matrix
                .iter()
                .map(|&v| fmt_color(v))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "[/CalRGB<</WhitePoint[{}]/Gamma[{}]/Matrix[{matrix_text}]>>]",
                fmt_triplet(white_point),
                fmt_triplet(gamma),
            )
        }
        ColorSpace::IccBased { profile, channels } => {
            let id = writer.put_new_stream(
                &format!("/N {channels}"),
                StreamPayload::Plain(profile),
            )?;
            format!("[/ICCBased {id}]")
        }
        ColorSpace::Indexed { base, palette } => {
            let base_text = serialize_color_space(writer, base)?;
            let high = palette.len() / 3 - 1;
            let mut hex = String::with_capacity(palette.len() * 2);
            for byte in palette {
                hex.push_str(&format!("{byte:02X}"));
            }
            format!("[/Indexed {base_text} {high} <{hex}>]")
        }
    })
}

fn fmt_triplet(values: &[f64; 3]) -> String {
    values
        .iter()
        .map(|&v| fmt_color(v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Colourimetry values get six decimals; `fmt_num`'s three are too coarse
/// for white points.
fn fmt_color(value: f64) -> String {
    let text = format!("{value:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
