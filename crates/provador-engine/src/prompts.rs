use provador_contracts::Pose;

pub const STYLIST_NAME: &str = "TrocaRápida AI";

pub fn try_on_prompt(pose: Pose) -> String {
    format!(
        "Sua tarefa é um provador virtual. Pegue a peça de roupa da segunda imagem e coloque-a na pessoa da primeira imagem.
1.  **Fidelidade da Roupa:** É crucial que a peça de roupa (incluindo cor, estampa, textura e todos os detalhes) na imagem final seja *exatamente idêntica* à da imagem de entrada. Não altere o design da roupa de forma alguma.
2.  **Realismo:** A roupa deve se ajustar de forma realista ao corpo da pessoa.
3.  **Pose:** {} A roupa deve se ajustar perfeitamente à nova pose.
4.  **Fundo:** O fundo da imagem resultante DEVE ser totalmente branco e neutro (#FFFFFF).
5.  **Qualidade:** O resultado deve ser uma única imagem fotorealista, sem nenhum texto ou explicação.",
        pose.instruction()
    )
}

pub const DESCRIBE_PROMPT: &str = "Analise a imagem desta peça de roupa. Retorne um objeto JSON com três chaves: \"name\" (o nome ou tipo da peça, ex: \"Vestido Azul Midi com Babados\"), \"description\" (uma descrição curta e atrativa da peça), e \"occasions\" (um texto breve sugerindo onde usá-la).";

pub const ACCESSORY_PROMPT: &str = "Esta é uma tarefa de edição de imagem. Pegue a pessoa na primeira imagem e adicione o acessório da segunda imagem nela de forma realista. O fundo deve permanecer branco. Mantenha a pessoa e a roupa original intactas, apenas adicionando o acessório.";

pub fn stylist_prompt(user_text: &str) -> String {
    format!(
        "Você é um estilista de moda amigável e prestativo, chamado {STYLIST_NAME}. Com base na imagem de uma pessoa usando uma roupa, responda à seguinte pergunta do usuário. Seja conciso, encorajador e dê conselhos práticos de moda.

Pergunta do usuário: \"{}\"",
        user_text.trim()
    )
}
