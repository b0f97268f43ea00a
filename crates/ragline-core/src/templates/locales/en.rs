use crate::templates::LocaleGroup;

pub const RAG: LocaleGroup = LocaleGroup {
    language: "en",
    group: "rag",
    templates: &[
        (
            "system_prompt",
            "You are an assistant to generate a response for the user.\n\
             You will be provided by a set of documents associated with the user's query.\n\
             You have to generate a response based on the documents provided.\n\
             Ignore the documents that are not relevant to the user's query.\n\
             You can apologize to the user if you are not able to generate a response.\n\
             You have to generate the response in the same language as the user's query.\n\
             Be polite and respectful to the user.\n\
             Be precise and concise in your response. Avoid unnecessary information.",
        ),
        (
            "document_prompt",
            "## Document No: $doc_num\n### Content: $chunk_text",
        ),
        ("query_prompt", "## Question:\n$query"),
        (
            "footer_prompt",
            "Based only on the above documents, please generate an answer for the user.\n\
             ## Answer:",
        ),
    ],
};
