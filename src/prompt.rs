//! Composes the one prompt a run sends to every backend.

use crate::config::Config;
use crate::models::{GenerationRequest, StoryCandidate};
use crate::protocol::{DELIMITER, DirectiveKind, Field};

/// Build the request for `story` under the configured protocol and image
/// strategy.
pub fn build_request(story: &StoryCandidate, config: &Config) -> GenerationRequest {
    let directive = config.image_strategy.directive_kind();
    let fields = config.protocol.fields();

    let mut requirements = vec![
        "Título profesional (sin números).".to_string(),
        "4 Párrafos bien estructurados.".to_string(),
    ];
    if fields.contains(&Field::ImageDirective) {
        requirements.push(match directive {
            DirectiveKind::Keyword => "Una palabra clave en inglés para la foto.".to_string(),
            DirectiveKind::Scene => "Una descripción visual en inglés (una sola frase, sin nombres propios) \
                 de una fotografía que ilustre la noticia."
                .to_string(),
        });
    }
    if fields.contains(&Field::Category) {
        requirements.push(
            "Una categoría temática de una o dos palabras (por ejemplo: Política, Economía, Conflictos).".to_string(),
        );
    }
    if fields.contains(&Field::Location) {
        requirements.push("El país o región principal de la noticia.".to_string());
    }
    let requirements = requirements
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Eres un Periodista Senior de '{masthead}'.\n\n\
         NOTICIA:\n\
         TITULAR: {title}\n\
         DATOS: {data}\n\n\
         TAREA:\n\
         Escribe un ARTÍCULO DE FONDO (4 párrafos) en ESPAÑOL NEUTRO.\n\
         Extiende la información explicando el contexto y las consecuencias.\n\n\
         REQUISITOS:\n\
         {requirements}\n\n\
         FORMATO DE SALIDA (Usa el separador {DELIMITER}):\n\
         {template}\n\n\
         REGLAS HTML:\n\
         - Primer párrafo: <b>CIUDAD (Radar) —</b> ...\n\
         - Usa <p>, <b> y <blockquote>.\n\
         - No uses Markdown.\n\
         - No escribas nada fuera del formato de salida.",
        masthead = config.masthead,
        title = story.title,
        data = story.eligibility_text(),
        template = config.protocol.output_template(directive),
    );

    GenerationRequest::new(prompt)
}
