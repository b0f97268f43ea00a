use crate::templates::LocaleGroup;

pub const RAG: LocaleGroup = LocaleGroup {
    language: "ar",
    group: "rag",
    templates: &[
        (
            "system_prompt",
            "أنت مساعد لتوليد رد للمستخدم.\n\
             سيتم تزويدك بمجموعة من الوثائق المرتبطة باستعلام المستخدم.\n\
             عليك توليد رد بناءً على الوثائق المقدمة.\n\
             تجاهل الوثائق غير المرتبطة باستعلام المستخدم.\n\
             يمكنك الاعتذار للمستخدم إذا لم تتمكن من توليد رد.\n\
             يجب أن تولد الرد بنفس لغة استعلام المستخدم.\n\
             كن مهذبًا ومحترمًا تجاه المستخدم.\n\
             كن دقيقًا وموجزًا في ردك. تجنب المعلومات غير الضرورية.",
        ),
        (
            "document_prompt",
            "## رقم الوثيقة: $doc_num\n### المحتوى: $chunk_text",
        ),
        ("query_prompt", "# السؤال\n$query"),
        (
            "footer_prompt",
            "بناءً فقط على الوثائق المذكورة أعلاه، يرجى توليد إجابة للمستخدم.\n\
             \n\
             ## الإجابة:",
        ),
    ],
};
